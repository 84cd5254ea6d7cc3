use gaffer_discord::commands::command_definitions;

/// Registration payloads for out-of-band command registration, e.g. piping
/// into a manual HTTP call against the applications API.
pub fn run() -> String {
    let definitions = command_definitions();
    serde_json::to_string_pretty(&definitions)
        .unwrap_or_else(|error| format!("could not serialize command definitions: {error}"))
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn output_is_valid_json_with_all_three_commands() {
        let output = run();
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        let commands = parsed.as_array().expect("array of commands");
        assert_eq!(commands.len(), 3);

        let names: Vec<&str> =
            commands.iter().filter_map(|command| command["name"].as_str()).collect();
        assert_eq!(names, vec!["offer", "view", "release"]);
    }

    #[test]
    fn offer_choices_match_the_closed_sets() {
        let parsed: serde_json::Value = serde_json::from_str(&run()).expect("valid json");

        let role_choices = parsed[0]["options"][1]["choices"].as_array().expect("role choices");
        assert_eq!(role_choices.len(), 4);
        assert!(role_choices.iter().any(|choice| choice["value"] == "Assistant Manager"));

        let position_choices =
            parsed[0]["options"][2]["choices"].as_array().expect("position choices");
        assert!(position_choices.iter().any(|choice| choice["value"] == "Center-back"));
    }
}
