//! Terminal output for inspection reports
//!
//! The report goes to stdout, where the CI step shows it. Progress for the
//! engine run goes to stderr and only when a person is watching.
//!
//! # Example
//!
//! ```rust,ignore
//! use inspect_runner::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Running inspections...");
//! // ... engine runs ...
//! spinner.clear();
//!
//! ui::lineage_header(&ctx, &execution.lineage);
//! ui::inspection(&ctx, &execution.outcome);
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{inspection, lineage_header, verdict};
pub use progress::TaskSpinner;
