use arch_bot_commons::*;

fn main() {
    // Force a dot-decimal locale before any numeric parsing happens.
    // TODO: Audit that the environment access only happens in single-threaded code.
    unsafe { std::env::set_var("LC_NUMERIC", "C") };

    let cli = telebot::cli::Cli::parse_from_env();
    if cli.show_help {
        telebot::cli::print_help();
        return;
    }

    if std::env::var_os("RUST_LOG").is_none() {
        let default_log = if cli.verbose { "debug" } else { "WARN,telebot=info" };
        unsafe { std::env::set_var("RUST_LOG", default_log) };
    }

    start_everything(telebot::entry(cli));
}
