//! String template rendering utilities.

use std::collections::HashMap;

pub struct TemplateVars;

impl TemplateVars {
    pub const TITLE: &'static str = "title";
    pub const REVISION: &'static str = "revision";
    pub const DOWN_REVISION: &'static str = "downRevision";
    pub const DOWN_REVISION_LITERAL: &'static str = "downRevisionLiteral";
    pub const BRANCH_LABELS: &'static str = "branchLabels";
    pub const DEPENDS_ON: &'static str = "dependsOn";
    pub const CREATE_DATE: &'static str = "createDate";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn render_map(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}
