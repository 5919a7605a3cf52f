pub mod assertions;
pub mod fixtures;
pub mod logging;

pub use assertions::{assert_contains, assert_exit_code};
pub use fixtures::{TestProject, hermetic, rbp};
pub use logging::init_test_logging;
