//! CLI domain: parse, route, and output only.
//! No domain orchestration; single route table dispatches to the generation service.

mod output;
mod parse;
mod route;

pub use output::{format_providers_json, format_providers_text, map_error, provider_rows};
pub use parse::{Cli, Commands, RequestArgs};
pub use route::RunContext;
