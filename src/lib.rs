pub mod api;
pub mod app_state;
pub mod books;
pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fees;
pub mod fines;
pub mod guard;
pub mod loans;
pub mod members;
pub mod models;
pub mod session;
pub mod stats;
pub mod utils;
pub mod view;

pub use api::{HttpApi, LibraryApi};
pub use app_state::AppState;
pub use books::BookCatalog;
pub use cache::ReferenceCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use errors::*;
pub use fees::{compute_late_fee, days_late, FeeSchedule, RATE_PER_DAY};
pub use fines::{enrich_fine, FineLedger};
pub use loans::{enrich_loan, FineAssessment, LoanManager, ReturnOutcome};
pub use members::MemberDirectory;
pub use models::*;
pub use session::{Route, Session, SessionEvent};
pub use stats::{loan_years, loans_per_month, MonthlyCount, YearFilter};
pub use view::*;
