use serde_json::{json, Value};

use crate::types::ToolSpec;

/// Fixed ordered catalog of the tools the runtime exposes to the completion
/// service. Built once at startup and attached unmodified to every request.
pub fn registry() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "write_file",
            description: "Write, update, or save a file in the project.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "The relative path to the file." },
                    "content": { "type": "string", "description": "The new content of the file." }
                },
                "required": ["path", "content"]
            }),
        },
        ToolSpec {
            name: "read_file",
            description: "Read the contents of a file.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "The relative path to the file." }
                },
                "required": ["path"]
            }),
        },
        ToolSpec {
            name: "run_command",
            description: "Run a command in the terminal.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to execute." }
                },
                "required": ["command"]
            }),
        },
        ToolSpec {
            name: "list_files",
            description: "List files in a directory to understand project structure.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "The relative path to the directory." }
                },
                "required": ["path"]
            }),
        },
        ToolSpec {
            name: "grep_search",
            description: "Search for a string across all files in a directory (recursive).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "directory": { "type": "string", "description": "The directory to search in." },
                    "query": { "type": "string", "description": "The string to search for." }
                },
                "required": ["directory", "query"]
            }),
        },
        ToolSpec {
            name: "replace_lines",
            description: "Replace specific lines in a file by providing the line range.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "The path to the file." },
                    "startLine": { "type": "number", "description": "The starting line number (1-indexed)." },
                    "endLine": { "type": "number", "description": "The ending line number (1-indexed)." },
                    "content": { "type": "string", "description": "The new content to insert." }
                },
                "required": ["path", "startLine", "endLine", "content"]
            }),
        },
    ]
}

pub fn wire_catalog(specs: &[ToolSpec]) -> Vec<Value> {
    specs.iter().map(ToolSpec::to_wire).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::tool_host::ToolInvocation;

    use super::{registry, wire_catalog};

    #[test]
    fn catalog_order_and_names_are_stable() {
        let names = registry().iter().map(|spec| spec.name).collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "write_file",
                "read_file",
                "run_command",
                "list_files",
                "grep_search",
                "replace_lines"
            ]
        );
    }

    #[test]
    fn every_spec_declares_required_parameters() {
        for spec in registry() {
            let required = spec.parameters["required"]
                .as_array()
                .unwrap_or_else(|| panic!("tool {} missing required list", spec.name));
            assert!(!required.is_empty(), "tool {}", spec.name);
            for key in required {
                let key = key.as_str().expect("required entry is a string");
                assert!(
                    spec.parameters["properties"].get(key).is_some(),
                    "tool {} requires undeclared parameter {key}",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn wire_catalog_uses_function_tool_shape() {
        let specs = registry();
        let wire = wire_catalog(&specs);
        assert_eq!(wire.len(), specs.len());
        for entry in &wire {
            assert_eq!(entry["type"], "function");
            assert!(entry["function"]["name"].as_str().is_some());
            assert!(entry["function"]["parameters"].is_object());
        }
    }

    #[test]
    fn every_registered_tool_dispatches_to_a_backend() {
        // A registered name that fails to parse for a reason other than its
        // arguments would mean the catalog and dispatch drifted apart.
        for spec in registry() {
            let outcome = ToolInvocation::parse(spec.name, &Value::Object(Default::default()));
            if let Err(err) = outcome {
                assert_ne!(err.code.as_str(), "unsupported_tool", "tool {}", spec.name);
            }
        }
    }
}
