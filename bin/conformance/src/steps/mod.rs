use webserv_harness::STEP_TEMPLATES;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("steps")
            .about("lists every step phrase scenarios may use")
            .arg(
                clap::Arg::new("filter")
                    .help("only list phrases containing this text")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(String)),
            ),
    )
}

pub fn run(args: &clap::ArgMatches) {
    let filter = args.get_one::<String>("filter");
    for template in STEP_TEMPLATES
        .iter()
        .filter(|template| filter.is_none_or(|text| template.contains(text.as_str())))
    {
        println!("{template}");
    }
}
