//! Snapshot tests
//!
//! Loads each *.yml file in /tests/ individually, builds its flag table and
//! compares the flags resolved for every entry of its `queries` list.
use projconf::value::Value;

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PROJCONF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("*.yml", |path| {
        let config = projconf::ConfigTree::from_yaml_file(path).expect("fixture must parse");
        let table = projconf::FlagTable::from_tree(&config).expect("must be a valid flag table");

        let queries = config
            .get(&["queries"])
            .and_then(Value::as_array)
            .expect("fixture must list queries");

        let rendered: Vec<String> = queries
            .iter()
            .map(|query| {
                let parts: Vec<Option<String>> = query
                    .as_array()
                    .expect("query is a list")
                    .iter()
                    .map(Value::scalar_string)
                    .collect();

                let [Some(context), operation, Some(filepath)] = parts.as_slice() else {
                    panic!("query must be [context, operation, filepath]: {query:?}");
                };

                let flags = table.flag_down(context, operation.as_deref(), filepath);
                let flags = if flags.is_empty() {
                    "(none)".to_string()
                } else {
                    flags.join(" ")
                };

                format!(
                    "{context} {} {filepath} => {flags}",
                    operation.as_deref().unwrap_or("-")
                )
            })
            .collect();

        insta::assert_snapshot!(rendered.join("\n"));
    });
}
