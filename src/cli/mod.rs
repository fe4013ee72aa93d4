pub mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "feedctl")]
#[command(about = "Call a desktop feed reader's HTTP automation API", long_about = None)]
#[command(after_help = "\
Arguments after the operation path are passed through as they would appear \
in a URL, i.e. key=value pairs. Operations that expect a configuration \
document read it from stdin.

Examples:
  List all channels and their configuration:
    feedctl channels/list verbose=1

  Get the summary page for a channel:
    feedctl --raw channels/get name=... sfim=all

  Update a report's configuration:
    feedctl reports/update id=... <new-config.xml

  Add an item to the default workpad:
    feedctl workpads/addItem id=@ url=https://example.com title=Example")]
pub struct Cli {
    /// API endpoint URL (default http://localhost:2604)
    #[arg(short = 'u', long, env = "FEEDCTL_URL")]
    pub url: Option<String>,

    /// API access token
    #[arg(short = 't', long, env = "FEEDCTL_TOKEN")]
    pub token: Option<String>,

    /// Print the HTTP response headers
    #[arg(long)]
    pub headers: bool,

    /// Print the raw response body without decoding it
    #[arg(short, long)]
    pub raw: bool,

    /// Operation path, e.g. "channels/list"
    pub operation: String,

    /// key=value arguments passed to the operation
    pub args: Vec<String>,
}
