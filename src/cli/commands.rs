use std::collections::BTreeMap;
use std::io::{IsTerminal, Read, Write};

use reqwest::StatusCode;

use crate::app::Result;
use crate::cli::Cli;
use crate::client::ApiClient;
use crate::wire::{ApiArgs, Body};

pub async fn invoke(cli: &Cli) -> Result<()> {
    let client = ApiClient::new(cli.url.as_deref(), cli.token.as_deref())?;
    let args = parse_args(&cli.args);
    let post_data = read_stdin()?;

    let response = client
        .call(&cli.operation, &args, post_data.as_deref(), cli.raw)
        .await?;

    if cli.headers {
        print_headers(&response.headers);
    }

    if !response.is_success() {
        println!("HTTP {} {}", response.status, reason(response.status));
    }
    print_body(&response.body)?;
    Ok(())
}

/// Collect `key=value` pairs into API arguments; entries without `=` or with
/// an empty key are ignored.
fn parse_args(pairs: &[String]) -> ApiArgs {
    let mut args = ApiArgs::new();
    for pair in pairs {
        if let Some((key, value)) = pair.split_once('=') {
            if !key.is_empty() {
                args.set(key, value);
            }
        }
    }
    args
}

/// POST data comes from stdin when something is piped in.
fn read_stdin() -> Result<Option<String>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut data = String::new();
    stdin.read_to_string(&mut data)?;
    Ok(if data.is_empty() { None } else { Some(data) })
}

fn print_headers(headers: &BTreeMap<String, String>) {
    println!("Response headers:");
    let width = headers.keys().map(String::len).max().unwrap_or(0) + 1;
    for (key, value) in headers {
        println!("  {:<width$} {value}", format!("{key}:"));
    }
    println!();
}

fn print_body(body: &Body) -> Result<()> {
    match body {
        Body::Tree(tree) => println!("{}", tree.to_xml()),
        Body::Mapping(value) => println!("{}", serde_json::to_string(value)?),
        Body::Raw(bytes) => {
            let mut stdout = std::io::stdout();
            stdout.write_all(bytes)?;
            if !bytes.ends_with(b"\n") {
                println!();
            }
        }
        Body::Empty => {}
    }
    Ok(())
}

fn reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ArgValue;

    #[test]
    fn parses_key_value_pairs() {
        let pairs = vec!["verbose=1".to_string(), "name=Daily News".to_string()];
        let args = parse_args(&pairs);
        assert_eq!(args.get("verbose"), Some(&ArgValue::Str("1".into())));
        assert_eq!(args.get("name"), Some(&ArgValue::Str("Daily News".into())));
    }

    #[test]
    fn value_keeps_everything_after_the_first_equals() {
        let pairs = vec!["query=a=b".to_string()];
        let args = parse_args(&pairs);
        assert_eq!(args.get("query"), Some(&ArgValue::Str("a=b".into())));
    }

    #[test]
    fn malformed_pairs_are_ignored() {
        let pairs = vec!["no-equals".to_string(), "=value".to_string()];
        let args = parse_args(&pairs);
        assert!(args.is_empty());
    }

    #[test]
    fn status_reasons_are_resolved() {
        assert_eq!(reason(404), "Not Found");
        assert_eq!(reason(599), "");
    }
}
