//! Before-build selection from a tag's build history

use crate::buildsys::BuildSystem;
use crate::error::DriverResult;
use crate::nvr::Nvr;
use tracing::debug;

/// Resolve the before-build for a regular (non-module) after-build.
///
/// 1. Latest build of the package in `tag`; if it is not `after`, use it.
/// 2. Otherwise take the latest two and use the one that is not `after`.
///
/// When both of the latest two equal `after` (duplicate tagging) the result
/// is absent; the lookback stops there.
pub async fn resolve_before(
    builds: &dyn BuildSystem,
    after: &Nvr,
    tag: &str,
) -> DriverResult<Option<Nvr>> {
    let package = &after.name;

    let latest = builds.list_tagged(tag, package, Some(1)).await?;
    let Some(candidate) = latest.into_iter().next() else {
        debug!("No builds of {} tagged in {}", package, tag);
        return Ok(None);
    };

    if candidate != *after {
        debug!("Latest {} build in {} is {}", package, tag, candidate);
        return Ok(Some(candidate));
    }

    debug!("{} is already latest in {}, looking one build back", after, tag);
    let latest_two = builds.list_tagged(tag, package, Some(2)).await?;
    Ok(latest_two.into_iter().find(|nvr| nvr != after))
}

/// Resolve the before-build for a module after-build.
///
/// Same two-step fallback, over the tag's module builds that share the
/// after-build's name-stream. The listing places the most recent build
/// last, so selection runs from the tail.
pub async fn resolve_before_module(
    builds: &dyn BuildSystem,
    after: &Nvr,
    tag: &str,
) -> DriverResult<Option<Nvr>> {
    let name_stream = after.name_stream();

    let listing = builds.list_tagged(tag, &after.name, None).await?;
    let mut matching: Vec<Nvr> = listing
        .into_iter()
        .filter(|nvr| nvr.name_stream() == name_stream)
        .collect();

    let Some(last) = matching.pop() else {
        debug!("No {} module builds tagged in {}", name_stream, tag);
        return Ok(None);
    };

    if last != *after {
        return Ok(Some(last));
    }

    debug!("{} is already latest in {}, looking one build back", after, tag);
    Ok(matching.pop().filter(|nvr| nvr != after))
}
