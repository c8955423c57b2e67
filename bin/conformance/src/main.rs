mod run;
mod steps;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> std::result::Result<(), BoxedError> {
    let commander = steps::register(run::register(
        clap::Command::new("conformance")
            .about("Runs scripted HTTP/1.1 conformance scenarios against a live server")
            .arg_required_else_help(true),
    ));

    let matches = commander.get_matches();
    match matches.subcommand() {
        Some(("run", arguments)) => {
            if !run::run(arguments)? {
                std::process::exit(1);
            }
        }
        Some(("steps", arguments)) => steps::run(arguments),
        _ => {}
    }

    Ok(())
}
