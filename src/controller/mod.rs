//! Client side of the scan workflow: submit a scan, follow its progress, and
//! re-probe individual rows. The page is abstracted behind [`ScanView`] and
//! [`RecheckView`] so the same flows drive a terminal or a test double.

pub mod api;
pub mod recheck;
pub mod scan;
pub mod terminal;
pub mod view;

pub use api::{ClientError, HttpScanApi, ScanApi};
pub use recheck::{RecheckController, RecheckOutcome};
pub use scan::{PollOutcome, ScanController};
pub use terminal::TerminalView;
pub use view::{MessageTone, RecheckView, ScanView};
