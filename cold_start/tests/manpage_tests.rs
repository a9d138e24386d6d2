use cold_start_cli_types::Cli;

static EXPECTED_COMMANDS: &[&str] = &[
    "cold-start run",
    "cold-start measure",
    "cold-start preload",
    "cold-start clear",
    "cold-start catalog",
    "cold-start config",
];

#[test]
fn test_markdown_documents_all_commands() {
    let content = clap_markdown::help_markdown::<Cli>();
    assert!(!content.trim().is_empty());
    for command in EXPECTED_COMMANDS.iter() {
        assert!(
            content.contains(command),
            "Markdown documentation does not contain command: {}",
            command
        );
    }
}

#[test]
fn test_manpages_render() {
    let cmd = Cli::command_without_version();
    let mut buffer: Vec<u8> = Default::default();
    clap_mangen::Man::new(cmd.clone()).render(&mut buffer).unwrap();
    let main_page = String::from_utf8(buffer).unwrap();
    assert!(main_page.contains("measure"));

    for subcmd in cmd.get_subcommands() {
        let mut buffer: Vec<u8> = Default::default();
        clap_mangen::Man::new(subcmd.clone()).render(&mut buffer).unwrap();
        assert!(!buffer.is_empty(), "empty manpage for {}", subcmd.get_name());
    }
}
