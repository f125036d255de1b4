use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.:-]*)\}").expect("valid regex"));

/// Runtime parameters passed to a config.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse from CLI args like "key=value".
    pub fn from_args(args: &[String]) -> Result<Self> {
        args.iter().try_fold(Self::new(), |params, arg| {
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::Config(format!("invalid param '{}', expected key=value", arg))
            })?;
            if key.trim().is_empty() {
                return Err(Error::Config(format!("invalid param '{}', empty key", arg)));
            }
            Ok(params.set(key.trim(), value))
        })
    }
}

/// Parameter definition in config.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub required: bool,

    /// Used when the caller supplies nothing.
    pub default: Option<String>,

    pub description: Option<String>,
}

/// Expand `${name}` and `${env:NAME}` placeholders.
///
/// Lookup order for `${name}`: caller params, then the definition's default.
/// A required param with neither is an error; an optional one expands to
/// the empty string. Names with no definition and no value are left as
/// written. `${env:NAME}` must name a set environment variable.
pub fn substitute(
    template: &str,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        match resolve(name.as_str(), params, defs)? {
            Some(value) => out.push_str(&value),
            None => out.push_str(whole.as_str()),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn resolve(
    name: &str,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<Option<String>> {
    if let Some(var) = name.strip_prefix("env:") {
        return std::env::var(var).map(Some).map_err(|_| {
            Error::Config(format!("environment variable {} is not set", var))
        });
    }
    if let Some(v) = params.get(name) {
        return Ok(Some(v.to_string()));
    }
    let Some(def) = defs.get(name) else {
        return Ok(None);
    };
    match (&def.default, def.required) {
        (Some(default), _) => Ok(Some(default.clone())),
        (None, true) => Err(Error::Config(format!(
            "missing required parameter: {}",
            name
        ))),
        (None, false) => Ok(Some(String::new())),
    }
}

/// Recursively substitute params in every string of a YAML document.
pub fn substitute_value(
    value: &mut serde_yaml::Value,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => {
            *s = substitute(s, params, defs)?;
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, params, defs)?;
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for v in seq.iter_mut() {
                substitute_value(v, params, defs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(required: bool, default: Option<&str>) -> ParamDef {
        ParamDef {
            required,
            default: default.map(String::from),
            description: None,
        }
    }

    #[test]
    fn test_substitute_simple() {
        let params = Params::new().set("engine", "bing");
        let result = substitute("search with ${engine}!", &params, &HashMap::new()).unwrap();
        assert_eq!(result, "search with bing!");
    }

    #[test]
    fn test_substitute_multiple_and_repeated() {
        let params = Params::new().set("a", "1").set("b", "2");
        let result = substitute("${a} + ${b} = ${a}${b}", &params, &HashMap::new()).unwrap();
        assert_eq!(result, "1 + 2 = 12");
    }

    #[test]
    fn test_substitute_default() {
        let mut defs = HashMap::new();
        defs.insert("engine".to_string(), def(false, Some("baidu")));
        let result = substitute("use ${engine}", &Params::new(), &defs).unwrap();
        assert_eq!(result, "use baidu");
    }

    #[test]
    fn test_substitute_required_missing() {
        let mut defs = HashMap::new();
        defs.insert("query".to_string(), def(true, None));
        let err = substitute("find ${query}", &Params::new(), &defs).unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_substitute_optional_empty_and_unknown_kept() {
        let mut defs = HashMap::new();
        defs.insert("suffix".to_string(), def(false, None));
        let result = substitute("a${suffix}b ${other}", &Params::new(), &defs).unwrap();
        assert_eq!(result, "ab ${other}");
    }

    #[test]
    fn test_substitute_env() {
        std::env::set_var("EOKA_PILOT_TEST_MODEL", "qwen");
        let result = substitute("model ${env:EOKA_PILOT_TEST_MODEL}", &Params::new(), &HashMap::new())
            .unwrap();
        assert_eq!(result, "model qwen");

        let err = substitute("${env:EOKA_PILOT_TEST_UNSET_VAR}", &Params::new(), &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("EOKA_PILOT_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_params_from_args() {
        let args = vec!["query=highest mountain".to_string(), "engine=bing".to_string()];
        let params = Params::from_args(&args).unwrap();
        assert_eq!(params.get("query"), Some("highest mountain"));
        assert_eq!(params.get("engine"), Some("bing"));

        assert!(Params::from_args(&["novalue".to_string()]).is_err());
        assert!(Params::from_args(&["=x".to_string()]).is_err());
    }
}
