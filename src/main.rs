use clap::Parser;
use dayledger::cli::{
    handle_calendar, handle_init, handle_ledger, handle_meal, handle_streak, handle_template,
    handle_water, handle_workout, init_logging, Cli, Commands,
};

fn main() {
    let cli = Cli::parse();
    init_logging();

    let user = cli.user;
    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Ledger(cmd) => handle_ledger(&user, cmd.action),
        Commands::Meal(cmd) => handle_meal(&user, cmd.action),
        Commands::Workout(cmd) => handle_workout(&user, cmd.action),
        Commands::Water {
            glasses,
            date,
            json,
        } => handle_water(&user, glasses, date, json),
        Commands::Template(cmd) => handle_template(&user, cmd.action),
        Commands::Calendar { month, json } => handle_calendar(&user, month, json),
        Commands::Streak { domain, json } => handle_streak(&user, domain, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
