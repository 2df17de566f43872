use std::collections::BTreeMap;
use std::path::Path;

/// A build property value from `report_answers.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl std::fmt::Display for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropValue::Int(value) => write!(f, "{}", value),
            PropValue::Bool(value) => write!(f, "{}", value),
            PropValue::Str(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        if let Ok(number) = value.parse() {
            return PropValue::Int(number);
        }
        match value.to_lowercase().as_str() {
            "on" | "true" | "yes" => return PropValue::Bool(true),
            "off" | "false" | "no" => return PropValue::Bool(false),
            _ => {}
        }
        match value.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
            Some(quoted) => PropValue::Str(quoted.to_string()),
            None => PropValue::Str(value.to_string()),
        }
    }
}

pub type Props = BTreeMap<String, PropValue>;

/// Parses `-pname=value` lines; everything else is ignored
pub fn parse_props(text: &str) -> Props {
    text.lines()
        .filter_map(|line| line.strip_prefix("-p"))
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.to_string(), PropValue::from(value)))
        .collect()
}

/// Reads `<bin_dir>/report_answers.txt`; a missing file means no properties
pub fn read_props(bin_dir: &Path) -> Props {
    match std::fs::read_to_string(bin_dir.join("report_answers.txt")) {
        Ok(text) => parse_props(&text),
        Err(_) => Props::new(),
    }
}

/// Builds a job label such as `Debug, ubuntu-22.04, gcc-13, sanitizer`
pub fn build_job_flag_name(mut props: Props) -> String {
    let is_msvc = matches!(props.get("compiler"), Some(PropValue::Str(name)) if name == "msvc");
    if is_msvc {
        props.remove("compiler.version");
    }
    props
        .entry("os.version".to_string())
        .or_insert_with(|| PropValue::Str("latest".to_string()));

    let versioned = |props: &Props, name: &str| -> Option<String> {
        let value = props.get(name)?;
        Some(match props.get(&format!("{name}.version")) {
            Some(version) => format!("{value}-{version}"),
            None => value.to_string(),
        })
    };

    let mut flag_name = props
        .get("build_type")
        .map(ToString::to_string)
        .unwrap_or_default();
    for part in [versioned(&props, "os"), versioned(&props, "compiler")]
        .into_iter()
        .flatten()
    {
        flag_name.push_str(", ");
        flag_name.push_str(&part);
    }

    let sanitized = match props.get("sanitizer") {
        Some(PropValue::Bool(enabled)) => *enabled,
        Some(_) => true,
        None => false,
    };
    if sanitized {
        flag_name.push_str(", sanitizer");
    }

    flag_name
}
