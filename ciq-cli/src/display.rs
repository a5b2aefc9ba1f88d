//! Display flags shared by result-listing commands

use clap::Args;
use std::time::Duration;

#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
    /// Show detailed test results
    #[arg(short = 'd', long = "error-detail")]
    pub test_details: bool,

    /// Show failed test stack traces
    #[arg(short = 's', long = "stack-trace")]
    pub test_traceback: bool,

    /// Show failed test stdout/stderr
    #[arg(short = 'p', long = "output")]
    pub test_output: bool,

    /// Show build URL link
    #[arg(short = 'l', long = "url")]
    pub url: bool,

    /// Show builder
    #[arg(long = "builder")]
    pub builder: bool,

    /// Show tags
    #[arg(long = "tags")]
    pub show_tags: bool,

    /// Show username
    #[arg(short = 'u', long = "username")]
    pub user: bool,

    /// Show version-control commit-id
    #[arg(short = 'c', long = "commit-id")]
    pub commit_id: bool,

    /// Show version-control branch
    #[arg(short = 'B', long = "branch")]
    pub branch: bool,

    /// Tab-separated output without sorting, saves memory in large queries
    #[arg(long = "no-sort")]
    pub no_sort: bool,

    /// Show a summary of failed test counts
    #[arg(long = "failed-summary", conflicts_with = "json")]
    pub failed_summary: bool,

    /// Show only builds started within this duration (e.g. "2h", "3days")
    #[arg(long = "since", value_parser = humantime::parse_duration)]
    pub since: Option<Duration>,

    /// Print the results as a JSON array
    #[arg(long = "json")]
    pub json: bool,
}

impl DisplayArgs {
    /// Whether test cases must be fetched and kept
    pub fn wants_test_cases(&self) -> bool {
        self.test_details || self.test_traceback || self.test_output
    }

    /// Whether a column is shown in table output
    pub fn shows(&self, column: &str) -> bool {
        match column {
            "BUILDER" => self.builder,
            "USER" => self.user,
            "BRANCH" => self.branch,
            "COMMIT-ID" => self.commit_id,
            "TAGS" => self.show_tags,
            "URL" => self.url,
            _ => true,
        }
    }
}
