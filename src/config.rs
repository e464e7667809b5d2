use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{CachePolicy, ResourceClient, fetch_resource, resolve_url};
use crate::domain::ProjectSource;
use crate::error::DredgeError;
use crate::scheduler::ChunkSizes;
use crate::status::{LoadingStatus, ResourceLog, StatusSink};

pub const DEFAULT_PAIRWISE_TEMPLATE: &str = "./pairwise_tests/%A_%B.txt";

const FILE_MESSAGE: &str = "Value should be a URL pointing to a file";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\w+:)?//([^\s.]+\.\S{2}|localhost[:?\d]*)\S*$").expect("valid URL pattern")
});

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub config_url: Option<Url>,
    pub storage_path: String,
    pub source: ProjectSource,
    pub chunk_sizes: ChunkSizes,
}

impl StartupConfig {
    pub fn global(config_url: Option<Url>, storage_path: impl Into<String>) -> Self {
        Self {
            config_url,
            storage_path: storage_path.into(),
            source: ProjectSource::Global,
            chunk_sizes: ChunkSizes::default(),
        }
    }

    pub fn from_location(location: &str, source: ProjectSource) -> Result<Self, DredgeError> {
        let config_url = match Url::parse(location) {
            Ok(url) => url,
            Err(_) => {
                let path = std::path::absolute(location)
                    .map_err(|err| DredgeError::Filesystem(format!("{location}: {err}")))?;
                Url::from_file_path(&path)
                    .map_err(|_| DredgeError::InvalidUrl(location.to_string()))?
            }
        };
        Ok(Self {
            storage_path: config_url.path().to_string(),
            config_url: Some(config_url),
            source,
            chunk_sizes: ChunkSizes::default(),
        })
    }

    pub fn saved_transcripts_key(&self) -> String {
        format!("{}-watched", self.storage_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptHyperlink {
    pub label: String,
    pub url: String,
}

impl TranscriptHyperlink {
    pub fn expand(&self, transcript: &str) -> String {
        self.url.replace("%name", transcript)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(skip)]
    pub base_url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abundance_measures: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abundance_limits: Option<[[f64; 2]; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairwise_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_hyperlink: Option<Vec<TranscriptHyperlink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_aliases: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
}

impl ProjectConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            label: None,
            url: None,
            readme: None,
            abundance_measures: None,
            abundance_limits: None,
            treatments: None,
            pairwise_name: None,
            transcript_hyperlink: None,
            transcript_aliases: None,
            diagram: None,
            grid: None,
        }
    }

    pub fn resolve(&self, path: &str) -> Result<Url, DredgeError> {
        resolve_url(&self.base_url, path)
    }

    pub fn pairwise_template(&self) -> &str {
        self.pairwise_name
            .as_deref()
            .unwrap_or(DEFAULT_PAIRWISE_TEMPLATE)
    }

    pub fn hyperlinks_for(&self, transcript: &str) -> Vec<(String, String)> {
        self.transcript_hyperlink
            .iter()
            .flatten()
            .map(|link| (link.label.clone(), link.expand(transcript)))
            .collect()
    }

    pub fn to_project_json(&self) -> Result<Value, DredgeError> {
        let mut export = self.clone();
        export.transcript_hyperlink = export
            .transcript_hyperlink
            .map(|links| {
                links
                    .into_iter()
                    .filter(|link| !link.label.is_empty() && link.url.contains("%name"))
                    .collect::<Vec<_>>()
            })
            .filter(|links| !links.is_empty());
        serde_json::to_value(&export).map_err(|err| DredgeError::ConfigLoad(err.to_string()))
    }
}

type FieldApply = fn(&mut ProjectConfig, &Value) -> Result<(), String>;

pub struct ConfigField {
    pub key: &'static str,
    pub label: &'static str,
    apply: FieldApply,
}

pub const CONFIG_FIELDS: [ConfigField; 11] = [
    ConfigField {
        key: "label",
        label: "Project label",
        apply: |config, value| {
            config.label = Some(as_string(value, "Must be a string")?);
            Ok(())
        },
    },
    ConfigField {
        key: "url",
        label: "Project URL",
        apply: |config, value| {
            let url = as_string(value, "Value should be a URL")?;
            if !URL_PATTERN.is_match(&url) {
                return Err("Value should be a URL".to_string());
            }
            config.url = Some(url);
            Ok(())
        },
    },
    ConfigField {
        key: "readme",
        label: "Project Readme",
        apply: |config, value| {
            config.readme = Some(as_string(value, FILE_MESSAGE)?);
            Ok(())
        },
    },
    ConfigField {
        key: "abundanceMeasures",
        label: "Treatment abundance measures",
        apply: |config, value| {
            config.abundance_measures = Some(as_string(value, FILE_MESSAGE)?);
            Ok(())
        },
    },
    ConfigField {
        key: "abundanceLimits",
        label: "Limits for abundance mesaures",
        apply: |config, value| {
            config.abundance_limits = Some(validate_abundance_limits(value)?);
            Ok(())
        },
    },
    ConfigField {
        key: "treatments",
        label: "Treatment descriptions",
        apply: |config, value| {
            config.treatments = Some(as_string(value, FILE_MESSAGE)?);
            Ok(())
        },
    },
    ConfigField {
        key: "pairwiseName",
        label: "Pairwise file naming format",
        apply: |config, value| {
            let template = as_string(value, FILE_MESSAGE)?;
            if !(template.contains("%A") && template.contains("%B")) {
                return Err("Value should be a template for loading pairwise comparisons, using %A and %B as placeholders.".to_string());
            }
            config.pairwise_name = Some(template);
            Ok(())
        },
    },
    ConfigField {
        key: "transcriptHyperlink",
        label: "Transcript hyperlink",
        apply: |config, value| {
            config.transcript_hyperlink = Some(validate_hyperlinks(value)?);
            Ok(())
        },
    },
    ConfigField {
        key: "transcriptAliases",
        label: "Alternate names for transcripts",
        apply: |config, value| {
            config.transcript_aliases = Some(as_string(value, FILE_MESSAGE)?);
            Ok(())
        },
    },
    ConfigField {
        key: "diagram",
        label: "Project diagram",
        apply: |config, value| {
            config.diagram = Some(as_string(value, FILE_MESSAGE)?);
            Ok(())
        },
    },
    ConfigField {
        key: "grid",
        label: "Project grid",
        apply: |config, value| {
            config.grid = Some(as_string(value, FILE_MESSAGE)?);
            Ok(())
        },
    },
];

fn as_string(value: &Value, message: &str) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| message.to_string())
}

pub fn validate_abundance_limits(value: &Value) -> Result<[[f64; 2]; 2], String> {
    const MESSAGE: &str = "Value must be an array of an array of two numbers";

    let pair = |value: &Value| -> Option<[f64; 2]> {
        match value.as_array()?.as_slice() {
            [lo, hi] => Some([lo.as_f64()?, hi.as_f64()?]),
            _ => None,
        }
    };

    let rows = value.as_array().ok_or(MESSAGE)?;
    match rows.as_slice() {
        [x, y] => Ok([pair(x).ok_or(MESSAGE)?, pair(y).ok_or(MESSAGE)?]),
        _ => Err(MESSAGE.to_string()),
    }
}

pub fn validate_hyperlinks(value: &Value) -> Result<Vec<TranscriptHyperlink>, String> {
    let links = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let label = item.get("label")?.as_str()?;
                    let url = item.get("url")?.as_str()?;
                    Some(TranscriptHyperlink {
                        label: label.to_string(),
                        url: url.to_string(),
                    })
                })
                .collect::<Option<Vec<_>>>()
        })
        .flatten()
        .ok_or("Value should be an array of { label, url } objects")?;

    if !links.iter().all(|link| link.url.contains("%name")) {
        return Err(
            "Every object should contain a `url` key containing the string \"%name\"".to_string(),
        );
    }
    Ok(links)
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(
        raw: &Map<String, Value>,
        base_url: Url,
        project: ProjectSource,
        sink: &dyn StatusSink,
    ) -> ProjectConfig {
        let mut config = ProjectConfig::new(base_url);

        for field in &CONFIG_FIELDS {
            let field_url = resolve_url(&config.base_url, &format!("project.json#{}", field.key))
                .ok()
                .map(|url| url.to_string());
            let log = ResourceLog::new(sink, project, field.label, field_url);
            let value = raw.get(field.key);

            if is_absent(value) {
                log.emit(LoadingStatus::Missing("No value specified".to_string()));
                continue;
            }

            match value.map(|value| (field.apply)(&mut config, value)) {
                Some(Ok(())) => log.emit(LoadingStatus::Ok),
                Some(Err(reason)) => log.emit(LoadingStatus::Failed(reason)),
                None => {}
            }
        }

        config
    }

    pub fn check_field(key: &str, value: &Value) -> Result<(), DredgeError> {
        let field = CONFIG_FIELDS
            .iter()
            .find(|field| field.key == key)
            .ok_or_else(|| DredgeError::ConfigField {
                field: key.to_string(),
                reason: "unknown field".to_string(),
            })?;
        let mut scratch = ProjectConfig::new(Url::parse("file:///").expect("valid literal URL"));
        (field.apply)(&mut scratch, value).map_err(|reason| DredgeError::ConfigField {
            field: key.to_string(),
            reason,
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub async fn load(
        client: &dyn ResourceClient,
        startup: &StartupConfig,
        sink: &dyn StatusSink,
    ) -> Result<Option<ProjectConfig>, DredgeError> {
        let Some(config_url) = startup.config_url.as_ref() else {
            return Ok(None);
        };
        let base_url = resolve_url(config_url, "./")?;
        let log = ResourceLog::new(
            sink,
            startup.source,
            "Project configuration",
            Some(config_url.to_string()),
        );
        log.emit(LoadingStatus::Pending);

        let body = match fetch_resource(client, config_url, CachePolicy::NoCache).await {
            Ok(body) => body,
            Err(err) => {
                log.emit(LoadingStatus::Failed(err.to_string()));
                return Err(DredgeError::ConfigLoad(err.to_string()));
            }
        };

        let raw = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(raw)) => raw,
            _ => {
                log.emit(LoadingStatus::Failed(
                    DredgeError::ConfigMalformed.to_string(),
                ));
                return Err(DredgeError::ConfigMalformed);
            }
        };
        log.emit(LoadingStatus::Ok);

        Ok(Some(ConfigValidator::validate(
            &raw,
            base_url,
            startup.source,
            sink,
        )))
    }
}
