use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::{Result, SurgeonError};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Load {
        path: String,
        policy: Option<String>,
    },
    Audit {
        output: String,
    },
    Strategies,
    Propose {
        strategy: String,
        column: Option<String>,
        rule: Option<String>,
        value: Option<String>,
    },
    Confirm {
        preview: Option<String>,
    },
    Cancel {
        preview: Option<String>,
    },
    Undo,
    History,
    WhitelistAdd {
        column: String,
        value: Option<String>,
        pattern: Option<String>,
    },
    WhitelistRemove {
        column: String,
        target: String,
    },
    WhitelistList,
    AcceptSchema,
    Export {
        path: String,
    },
    Status,
    Help,
    Close,
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code, see `SurgeonError::code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ReplResult {
    pub fn success_with_output(output: String) -> Self {
        Self {
            success: true,
            output: Some(output),
            data: None,
            error: None,
            code: None,
        }
    }

    pub fn success_with_data(data: Value) -> Self {
        Self {
            success: true,
            output: None,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn success_with_both(output: String, data: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            output: None,
            data: None,
            error: Some(error),
            code: None,
        }
    }

    pub fn from_error(err: &SurgeonError) -> Self {
        Self {
            success: false,
            output: None,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }

    pub fn empty_success() -> Self {
        Self {
            success: true,
            output: None,
            data: None,
            error: None,
            code: None,
        }
    }
}

impl ReplCommand {
    pub fn parse_interactive(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SurgeonError::Repl("Empty command".to_string()));
        }

        let tokens = tokenize(input)?;
        let parts: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "exit" | "quit" | "q" => Ok(ReplCommand::Exit),
            "help" | "?" => Ok(ReplCommand::Help),
            "status" => Ok(ReplCommand::Status),
            "strategies" | "fixes" => Ok(ReplCommand::Strategies),
            "undo" => Ok(ReplCommand::Undo),
            "history" => Ok(ReplCommand::History),
            "close" => Ok(ReplCommand::Close),
            "accept-schema" | "accept_schema" => Ok(ReplCommand::AcceptSchema),
            "load" | "open" => {
                let path = positional(&parts, 1)
                    .ok_or_else(|| SurgeonError::Repl("load requires a file path".to_string()))?;
                let policy = find_arg(&parts, "--policy", "-p");
                Ok(ReplCommand::Load { path, policy })
            }
            "audit" | "scan" => {
                let output = find_arg(&parts, "--output", "-o")
                    .unwrap_or_else(|| "table".to_string());
                Ok(ReplCommand::Audit { output })
            }
            "propose" | "fix" => {
                let strategy = find_arg(&parts, "--strategy", "-s")
                    .or_else(|| positional(&parts, 1))
                    .ok_or_else(|| SurgeonError::Repl("propose requires a strategy".to_string()))?;
                Ok(ReplCommand::Propose {
                    strategy,
                    column: find_arg(&parts, "--column", "-c"),
                    rule: find_arg(&parts, "--rule", "-r"),
                    value: find_arg(&parts, "--value", "-v"),
                })
            }
            "confirm" | "commit" | "yes" | "y" => Ok(ReplCommand::Confirm {
                preview: positional(&parts, 1),
            }),
            "cancel" | "no" | "n" => Ok(ReplCommand::Cancel {
                preview: positional(&parts, 1),
            }),
            "export" | "save" => {
                let path = positional(&parts, 1)
                    .ok_or_else(|| SurgeonError::Repl("export requires a file path".to_string()))?;
                Ok(ReplCommand::Export { path })
            }
            "whitelist" => {
                let action = parts.get(1).map(|s| s.to_lowercase());
                match action.as_deref() {
                    None | Some("list") => Ok(ReplCommand::WhitelistList),
                    Some("add") => {
                        let column = parts.get(2).map(|s| s.to_string()).ok_or_else(|| {
                            SurgeonError::Repl("whitelist add requires a column".to_string())
                        })?;
                        let pattern = find_arg(&parts, "--pattern", "");
                        let value = if pattern.is_some() {
                            None
                        } else {
                            Some(parts.get(3).map(|s| s.to_string()).ok_or_else(|| {
                                SurgeonError::Repl(
                                    "whitelist add requires a value or --pattern".to_string(),
                                )
                            })?)
                        };
                        Ok(ReplCommand::WhitelistAdd { column, value, pattern })
                    }
                    Some("remove") | Some("rm") => {
                        let column = parts.get(2).map(|s| s.to_string());
                        let target = parts.get(3).map(|s| s.to_string());
                        match (column, target) {
                            (Some(column), Some(target)) => {
                                Ok(ReplCommand::WhitelistRemove { column, target })
                            }
                            _ => Err(SurgeonError::Repl(
                                "whitelist remove requires a column and a value".to_string(),
                            )),
                        }
                    }
                    Some(other) => Err(SurgeonError::Repl(format!(
                        "whitelist action must be add, remove or list (got {})",
                        other
                    ))),
                }
            }
            _ => Err(SurgeonError::Repl(format!("Unknown command: {}", cmd))),
        }
    }

    pub fn from_json_rpc(method: &str, params: Option<&Value>) -> Result<Self> {
        match method {
            "exit" | "quit" => Ok(ReplCommand::Exit),
            "help" => Ok(ReplCommand::Help),
            "status" => Ok(ReplCommand::Status),
            "strategies" => Ok(ReplCommand::Strategies),
            "undo" => Ok(ReplCommand::Undo),
            "history" => Ok(ReplCommand::History),
            "close" => Ok(ReplCommand::Close),
            "accept_schema" => Ok(ReplCommand::AcceptSchema),
            "whitelist_list" => Ok(ReplCommand::WhitelistList),
            "load" => Ok(ReplCommand::Load {
                path: required_param(params, "path", method)?,
                policy: str_param(params, "policy"),
            }),
            "audit" => Ok(ReplCommand::Audit {
                output: str_param(params, "output").unwrap_or_else(|| "json".to_string()),
            }),
            "propose" => Ok(ReplCommand::Propose {
                strategy: required_param(params, "strategy", method)?,
                column: str_param(params, "column"),
                rule: str_param(params, "rule"),
                value: str_param(params, "value"),
            }),
            "confirm" | "commit" => Ok(ReplCommand::Confirm {
                preview: str_param(params, "preview"),
            }),
            "cancel" => Ok(ReplCommand::Cancel {
                preview: str_param(params, "preview"),
            }),
            "whitelist_add" => {
                let column = required_param(params, "column", method)?;
                let value = str_param(params, "value");
                let pattern = str_param(params, "pattern");
                if value.is_none() && pattern.is_none() {
                    return Err(SurgeonError::Repl(
                        "whitelist_add requires 'value' or 'pattern' param".to_string(),
                    ));
                }
                Ok(ReplCommand::WhitelistAdd { column, value, pattern })
            }
            "whitelist_remove" => Ok(ReplCommand::WhitelistRemove {
                column: required_param(params, "column", method)?,
                target: required_param(params, "target", method)?,
            }),
            "export" => Ok(ReplCommand::Export {
                path: required_param(params, "path", method)?,
            }),
            _ => Err(SurgeonError::Repl(format!("Unknown method: {}", method))),
        }
    }
}

fn str_param(params: Option<&Value>, key: &str) -> Option<String> {
    params
        .and_then(|p| p.get(key))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
}

fn required_param(params: Option<&Value>, key: &str, method: &str) -> Result<String> {
    str_param(params, key)
        .ok_or_else(|| SurgeonError::Repl(format!("{} requires '{}' param", method, key)))
}

/// Split on whitespace, keeping double-quoted segments together.
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if quoted {
        return Err(SurgeonError::Repl("Unterminated quote".to_string()));
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// The `n`th argument that is neither a flag nor a flag's value.
fn positional(parts: &[&str], n: usize) -> Option<String> {
    let mut index = 0;
    let mut skip_next = false;
    for (i, &part) in parts.iter().enumerate() {
        if i == 0 {
            continue;
        }
        if skip_next {
            skip_next = false;
            continue;
        }
        if part.starts_with("--") || (part.starts_with('-') && part.len() == 2) {
            skip_next = !part.contains('=');
            continue;
        }
        index += 1;
        if index == n {
            return Some(part.to_string());
        }
    }
    None
}

fn find_arg(parts: &[&str], long: &str, short: &str) -> Option<String> {
    for (i, &part) in parts.iter().enumerate() {
        if part == long || (!short.is_empty() && part == short) {
            return parts.get(i + 1).map(|s| s.to_string());
        }
        if let Some(value) = part.strip_prefix(&format!("{}=", long)) {
            return Some(value.to_string());
        }
        if !short.is_empty() {
            if let Some(value) = part.strip_prefix(&format!("{}=", short)) {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit() {
        let cmd = ReplCommand::parse_interactive("exit").unwrap();
        assert!(matches!(cmd, ReplCommand::Exit));

        let cmd = ReplCommand::parse_interactive("quit").unwrap();
        assert!(matches!(cmd, ReplCommand::Exit));
    }

    #[test]
    fn test_parse_load_with_policy() {
        let cmd = ReplCommand::parse_interactive("load data/sales.json --policy rules.yaml").unwrap();
        assert_eq!(
            cmd,
            ReplCommand::Load {
                path: "data/sales.json".to_string(),
                policy: Some("rules.yaml".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_propose() {
        let cmd = ReplCommand::parse_interactive("propose fill-median --column price").unwrap();
        if let ReplCommand::Propose { strategy, column, rule, value } = cmd {
            assert_eq!(strategy, "fill-median");
            assert_eq!(column, Some("price".to_string()));
            assert!(rule.is_none());
            assert!(value.is_none());
        } else {
            panic!("Expected Propose command");
        }
    }

    #[test]
    fn test_parse_quoted_value() {
        let cmd = ReplCommand::parse_interactive(r#"propose replace-with-value --rule region_known --value "Not Given""#).unwrap();
        if let ReplCommand::Propose { value, rule, .. } = cmd {
            assert_eq!(value, Some("Not Given".to_string()));
            assert_eq!(rule, Some("region_known".to_string()));
        } else {
            panic!("Expected Propose command");
        }
    }

    #[test]
    fn test_parse_unterminated_quote() {
        assert!(ReplCommand::parse_interactive(r#"whitelist add region "North"#).is_err());
    }

    #[test]
    fn test_parse_whitelist() {
        let cmd = ReplCommand::parse_interactive("whitelist add region Unknown").unwrap();
        assert_eq!(
            cmd,
            ReplCommand::WhitelistAdd {
                column: "region".to_string(),
                value: Some("Unknown".to_string()),
                pattern: None,
            }
        );

        let cmd = ReplCommand::parse_interactive("whitelist add sku --pattern ^TEST-").unwrap();
        assert_eq!(
            cmd,
            ReplCommand::WhitelistAdd {
                column: "sku".to_string(),
                value: None,
                pattern: Some("^TEST-".to_string()),
            }
        );

        assert_eq!(ReplCommand::parse_interactive("whitelist").unwrap(), ReplCommand::WhitelistList);
        assert!(ReplCommand::parse_interactive("whitelist add region").is_err());
    }

    #[test]
    fn test_parse_confirm_aliases() {
        for input in ["confirm", "commit", "y"] {
            let cmd = ReplCommand::parse_interactive(input).unwrap();
            assert_eq!(cmd, ReplCommand::Confirm { preview: None });
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = ReplCommand::parse_interactive("frobnicate").unwrap_err();
        assert!(err.to_string().contains("Unknown command"));
    }

    #[test]
    fn test_from_json_rpc_propose() {
        let params = serde_json::json!({
            "strategy": "fill-value",
            "column": "qty",
            "value": 0
        });
        let cmd = ReplCommand::from_json_rpc("propose", Some(&params)).unwrap();
        assert_eq!(
            cmd,
            ReplCommand::Propose {
                strategy: "fill-value".to_string(),
                column: Some("qty".to_string()),
                rule: None,
                value: Some("0".to_string()),
            }
        );
    }

    #[test]
    fn test_from_json_rpc_missing_param() {
        let err = ReplCommand::from_json_rpc("load", None).unwrap_err();
        assert!(err.to_string().contains("'path'"));
    }

    #[test]
    fn test_from_json_rpc_unknown_method() {
        let err = ReplCommand::from_json_rpc("run", None).unwrap_err();
        assert!(err.to_string().contains("Unknown method"));
    }
}
