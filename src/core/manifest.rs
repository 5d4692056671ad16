// Local inspection of the deployment manifest. kubectl remains the authority
// on whether the manifest is acceptable; this only resolves the names the
// rollout and status steps need.

use serde::Deserialize;
use std::fs;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestInfo {
    pub deployment: Option<String>,
    pub service: Option<String>,
    pub pod_selector: Option<String>,
}

pub fn inspect(path: &str) -> Result<ManifestInfo> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::manifest_invalid(path, format!("cannot read manifest: {}", e)))?;
    parse(path, &content)
}

/// Scan every document of a (possibly multi-document) manifest. The first
/// Deployment and the first Service win.
pub fn parse(path: &str, content: &str) -> Result<ManifestInfo> {
    let mut info = ManifestInfo::default();

    for document in serde_yml::Deserializer::from_str(content) {
        let value = serde_yml::Value::deserialize(document)
            .map_err(|e| Error::manifest_invalid(path, e.to_string()))?;

        let Some(kind) = value.get("kind").and_then(|k| k.as_str()) else {
            continue;
        };
        let name = value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);

        match kind {
            "Deployment" => {
                if info.deployment.is_none() {
                    info.deployment = name;
                }
                if info.pod_selector.is_none() {
                    info.pod_selector = selector_from(&value);
                }
            }
            "Service" => {
                if info.service.is_none() {
                    info.service = name;
                }
            }
            _ => {}
        }
    }

    Ok(info)
}

fn selector_from(doc: &serde_yml::Value) -> Option<String> {
    let labels = doc
        .get("spec")?
        .get("selector")?
        .get("matchLabels")?
        .as_mapping()?;

    let mut pairs = Vec::new();
    for (key, value) in labels {
        let (Some(key), Some(value)) = (key.as_str(), value.as_str()) else {
            continue;
        };
        pairs.push(format!("{}={}", key, value));
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: library-api
spec:
  replicas: 2
  selector:
    matchLabels:
      app: library-api
---
apiVersion: v1
kind: Service
metadata:
  name: library-api-svc
spec:
  type: LoadBalancer
";

    #[test]
    fn resolves_deployment_service_and_selector() {
        let info = parse("deployment.yaml", MANIFEST).unwrap();
        assert_eq!(info.deployment.as_deref(), Some("library-api"));
        assert_eq!(info.service.as_deref(), Some("library-api-svc"));
        assert_eq!(info.pod_selector.as_deref(), Some("app=library-api"));
    }

    #[test]
    fn missing_documents_leave_fields_empty() {
        let info = parse("cm.yaml", "kind: ConfigMap\nmetadata:\n  name: settings\n").unwrap();
        assert_eq!(info, ManifestInfo::default());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = parse("bad.yaml", "kind: [unclosed\n").unwrap_err();
        assert_eq!(err.code.as_str(), "manifest.invalid");
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = inspect("/nonexistent/deckhand/deployment.yaml").unwrap_err();
        assert_eq!(err.code.as_str(), "manifest.invalid");
    }
}
