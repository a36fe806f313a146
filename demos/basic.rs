use chrono::{DateTime, FixedOffset, Local};
use pretty_log::{Attr, HandlerOptions, Level, PrettyHandler, Record};

fn main() {
    let handler = PrettyHandler::new(HandlerOptions::default().level(Level::DEBUG));
    let api = handler.with_attrs(vec![Attr::new("service", "api")]);

    let now: DateTime<FixedOffset> = Local::now().into();
    let records = [
        Record::new(now, Level::DEBUG, "loading config").add_attrs([Attr::new("path", "app.toml")]),
        Record::new(now, Level::INFO, "started").add_attrs([Attr::new("port", 8080)]),
        Record::new(now, Level::WARN, "slow request").add_attrs([
            Attr::group("req", [Attr::new("method", "GET"), Attr::new("ms", 812)]),
        ]),
        Record::new(now, Level::ERROR, "upstream failed").add_attrs([Attr::new("retry", false)]),
    ];

    for record in &records {
        if !api.enabled(record.level) {
            continue;
        }
        if let Err(e) = api.handle(record) {
            eprintln!("{}", e);
        }
    }

    let simple = PrettyHandler::default().attr_block(false);
    if let Err(e) = simple.handle(&Record::new(now, Level::INFO, "no attribute block")) {
        eprintln!("{}", e);
    }
}
