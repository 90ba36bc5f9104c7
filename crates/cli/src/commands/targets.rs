//! `targets` - list the targets of the workspace

use serde::Serialize;

use e2e_builder_host::LocalHost;

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Debug, Serialize)]
pub struct TargetRow {
    pub target: String,
    pub schedulable: bool,
    pub command: String,
    pub configurations: Vec<String>,
}

impl TableDisplay for TargetRow {
    fn headers() -> Vec<&'static str> {
        vec!["Target", "Schedulable", "Command", "Configurations"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.target.clone(),
            if self.schedulable { "yes" } else { "no" }.to_string(),
            if self.command.is_empty() {
                "-".to_string()
            } else {
                self.command.clone()
            },
            self.configurations.join(", "),
        ]
    }
}

pub fn rows(host: &LocalHost) -> Vec<TargetRow> {
    host.workspace()
        .targets()
        .map(|(project, name, target)| TargetRow {
            target: format!("{}:{}", project, name),
            schedulable: target.is_schedulable(),
            command: target.command.join(" "),
            configurations: target.configurations.keys().cloned().collect(),
        })
        .collect()
}

pub fn execute(host: &LocalHost, format: OutputFormat) {
    output::print_list(&rows(host), format);
}
