use std::{path::Path, str::FromStr};

use anyhow::bail;
use indoc::indoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::Config;

/// Load and validate configuration from a TOML file, expanding `${ENV_VAR}`-style references.
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate_has_providers(&config)?;

    Ok(config)
}

pub(crate) fn validate_has_providers(config: &Config) -> anyhow::Result<()> {
    if config.providers.is_empty() {
        bail!(indoc! {r#"
            No backend providers configured. Nexus requires at least one provider to function.

            Example configuration:

              [providers.anthropic]
              type = "anthropic"
              api_key = "{{ env.ANTHROPIC_API_KEY }}"

            See https://nexusrouter.com/docs for more configuration examples.
        "#});
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn expands_env_vars() {
        // SAFETY: test runs single-threaded w.r.t. this env var.
        unsafe { std::env::set_var("NEXUS_TEST_API_KEY", "sk-test-123") };

        let mut file = tempfile_with_contents(indoc! {r#"
            [providers.anthropic]
            type = "anthropic"
            api_key = "{{ env.NEXUS_TEST_API_KEY }}"
        "#});

        let config = load(file.path()).unwrap();
        let provider = config.providers.get("anthropic").unwrap();

        use secrecy::ExposeSecret;
        assert_eq!(provider.api_key().unwrap().expose_secret(), "sk-test-123");

        file.flush().unwrap();
    }

    #[test]
    fn rejects_empty_provider_table() {
        let file = tempfile_with_contents(indoc! {r#"
            [server]
            listen_address = "127.0.0.1:8080"
        "#});

        let result = load(file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No backend providers configured"));
    }

    fn tempfile_with_contents(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }
}
