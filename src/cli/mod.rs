mod commands;
mod handlers;

pub use commands::{
    Cli, Commands, LedgerAction, LedgerCommand, RecordAction, RecordCommand, TemplateAction,
    TemplateCommand,
};
pub use handlers::{
    handle_calendar, handle_init, handle_ledger, handle_meal, handle_streak, handle_template,
    handle_water, handle_workout, init_logging, LOG_ENV,
};
