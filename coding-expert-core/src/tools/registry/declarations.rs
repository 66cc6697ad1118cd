use crate::llm::provider::ToolDefinition;
use crate::tools::traits::Tool;
use std::fmt::Write;

/// Function catalog offered to providers with native tool calling
pub fn build_function_declarations<'a, I, T>(tools: I) -> Vec<ToolDefinition>
where
    I: IntoIterator<Item = &'a T>,
    T: Tool + ?Sized + 'a,
{
    tools
        .into_iter()
        .map(|tool| {
            ToolDefinition::function(
                tool.name().to_string(),
                tool.description().to_string(),
                tool.schema().to_json(),
            )
        })
        .collect()
}

/// Plain-text catalog embedded in the system prompt
pub fn render_tool_catalog<'a, I, T>(tools: I) -> String
where
    I: IntoIterator<Item = &'a T>,
    T: Tool + ?Sized + 'a,
{
    let mut out = String::new();
    for tool in tools {
        let schema = tool.schema();
        let _ = writeln!(out, "- {}({})", tool.name(), schema.signature());
        let _ = writeln!(out, "  {}", tool.description());
        for (name, property) in &schema.properties {
            if property.description.is_empty() {
                continue;
            }
            let _ = write!(out, "    {name}: {}", property.description);
            if let Some(values) = &property.enum_values {
                let _ = write!(out, " (one of: {})", values.join(", "));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::calculator::CalculatorTool;

    #[test]
    fn catalog_lists_signature_and_arguments() {
        let calculator = CalculatorTool;
        let catalog = render_tool_catalog([&calculator]);
        assert!(catalog.starts_with("- calculator(expression: string)"));
        assert!(catalog.contains("expression:"));

        let declarations = build_function_declarations([&calculator]);
        assert_eq!(declarations[0].function_name(), "calculator");
        assert_eq!(declarations[0].function.parameters["type"], "object");
    }
}
