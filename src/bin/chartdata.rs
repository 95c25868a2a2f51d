use egostrategy_chartdata::calendar::{Exchange, TradingCalendar};
use egostrategy_chartdata::models::request::{ChartRequest, IndicatorKind, RequestSpan};
use egostrategy_chartdata::util::{self, arrow_utils};
use egostrategy_chartdata::{ChartService, Config, Interval, Outcome, Period};

use chrono::{Datelike, Duration, NaiveDate};
use clap::{App, Arg, SubCommand};
use log::{error, info, warn};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger
    env_logger::init();

    let this_year = chrono::Local::now().year().to_string();

    // 创建基本的命令行应用
    let app = App::new("ChartData")
        .version(env!("CARGO_PKG_VERSION"))
        .author("EgoStrategy")
        .about("Chart data pipeline: symbol search, price history, indicators");

    // 添加子命令
    let app = app
        .subcommand(
            SubCommand::with_name("search")
                .about("Search symbols by ticker or company name")
                .arg(
                    Arg::with_name("query")
                        .short('q')
                        .long("query")
                        .value_name("QUERY")
                        .help("Ticker or company name")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("chart")
                .about("Fetch, clean and analyse the price history of a symbol")
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("SYMBOL")
                        .help("Ticker, or a name to resolve through symbol search")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("period")
                        .short('p')
                        .long("period")
                        .value_name("PERIOD")
                        .help("Display period (1d, 5d, 1mo, 3mo, 6mo, ytd, 1y, 3y, 5y, 10y, max)")
                        .takes_value(true)
                        .default_value("1y"),
                )
                .arg(
                    Arg::with_name("interval")
                        .short('i')
                        .long("interval")
                        .value_name("INTERVAL")
                        .help("Bar interval (15m, 1h, 1d, 1wk, 1mo); overrides the period")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("indicators")
                        .long("indicators")
                        .value_name("LIST")
                        .help("Comma separated overlays, e.g. MA20,MA50,WMA20,BB")
                        .takes_value(true)
                        .default_value("MA20,MA50"),
                )
                .arg(
                    Arg::with_name("rows")
                        .short('n')
                        .long("rows")
                        .value_name("ROWS")
                        .help("Number of most recent rows to print")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write the series with indicators to FILE")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output file format (arrow, json)")
                        .takes_value(true)
                        .possible_values(["arrow", "json"])
                        .default_value("arrow"),
                )
                .arg(
                    Arg::with_name("holidays")
                        .long("holidays")
                        .value_name("XLSX")
                        .help("Workbook with extra market closures")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("calendar")
                .about("List market holidays of an exchange")
                .arg(
                    Arg::with_name("exchange")
                        .short('e')
                        .long("exchange")
                        .value_name("EXCHANGE")
                        .help("Exchange calendar (us, lse, eu)")
                        .takes_value(true)
                        .default_value("us"),
                )
                .arg(
                    Arg::with_name("year")
                        .short('y')
                        .long("year")
                        .value_name("YEAR")
                        .takes_value(true)
                        .default_value(&this_year),
                )
                .arg(
                    Arg::with_name("holidays")
                        .long("holidays")
                        .value_name("XLSX")
                        .help("Workbook with extra market closures")
                        .takes_value(true),
                ),
        );

    let matches = app.get_matches();

    if let Some(matches) = matches.subcommand_matches("search") {
        let query = matches.value_of("query").unwrap_or_default();
        let service = ChartService::new(Config::from_env()?)?;
        let resolution = service.search(query).await;

        for diagnostic in &resolution.diagnostics {
            warn!("{}", diagnostic);
        }
        if resolution.is_empty() {
            println!("No symbol matches '{}'", query);
            return Ok(());
        }

        println!("{:<12} {:<40} {:<8}", "Symbol", "Name", "Exchange");
        println!("{:-<62}", "");
        for candidate in &resolution.matches {
            println!(
                "{:<12} {:<40} {:<8}",
                candidate.symbol,
                candidate.display_name,
                candidate.exchange.as_deref().unwrap_or("-")
            );
        }
    } else if let Some(matches) = matches.subcommand_matches("chart") {
        let mut config = Config::from_env()?;
        if let Some(path) = matches.value_of("holidays") {
            config = config.with_closures_workbook(path);
        }
        if let Some(rows) = matches.value_of("rows") {
            config = config.with_tail_rows(rows.parse::<usize>()?);
        }

        let span = match matches.value_of("interval") {
            Some(value) => match Interval::parse(value) {
                Some(interval) => RequestSpan::Interval(interval),
                None => {
                    error!("Unknown interval: {}", value);
                    return Err(format!("Unknown interval: {}", value).into());
                }
            },
            None => {
                let period = matches.value_of("period").unwrap_or("1y");
                RequestSpan::Period(Period::parse(period).unwrap_or_else(|| {
                    warn!("Unknown period {}, using max", period);
                    Period::Max
                }))
            }
        };

        let mut indicators = Vec::new();
        for name in matches.value_of("indicators").unwrap_or_default().split(',') {
            if name.trim().is_empty() {
                continue;
            }
            match IndicatorKind::parse(name) {
                Some(indicator) => indicators.push(indicator),
                None => warn!("Ignoring unknown indicator {}", name),
            }
        }

        let symbol = matches.value_of("symbol").unwrap_or_default();
        let tail_rows = config.tail_rows;
        let service = ChartService::new(config)?;
        let request = ChartRequest::new(symbol, span).with_indicators(indicators);
        info!("Requesting {} ({})", symbol, span);

        let response = service.chart_query(symbol, &request).await;
        for warning in &response.warnings {
            warn!("{}", warning);
        }

        let series = match response.series {
            Outcome::Data(series) => series,
            other => {
                println!(
                    "No chart for {}: {}",
                    response.symbol,
                    other.message().unwrap_or_default()
                );
                return Ok(());
            }
        };

        println!(
            "{} ({}) - {} bars at {}",
            response.display_name.as_deref().unwrap_or(&response.symbol),
            response.symbol,
            series.len(),
            response.interval
        );
        if let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) {
            println!(
                "From {} to {}",
                util::format_timestamp(first, series.interval),
                util::format_timestamp(last, series.interval)
            );
        }
        let names: Vec<&String> = series.indicators.keys().collect();
        let mut header = format!(
            "{:<17} {:>10} {:>10} {:>10} {:>10} {:>14}",
            "Date", "Open", "High", "Low", "Close", "Volume"
        );
        for name in &names {
            header.push_str(&format!(" {:>10}", name));
        }
        println!("{}", header);
        println!("{:-<width$}", "", width = header.len());

        for row in series.tail(tail_rows) {
            let mut line = format!(
                "{:<17} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>14}",
                util::format_timestamp(row.bar.timestamp, series.interval),
                row.bar.open,
                row.bar.high,
                row.bar.low,
                row.bar.close,
                row.bar.volume
            );
            for (_, value) in &row.indicators {
                line.push_str(&format!(" {:>10}", util::format_value(*value)));
            }
            println!("{}", line);
        }

        if let Some(path) = matches.value_of("output") {
            match matches.value_of("format").unwrap_or("arrow") {
                "json" => std::fs::write(path, arrow_utils::price_series_to_json(&series)?)?,
                _ => arrow_utils::save_price_series_to_arrow(&series, path)?,
            }
            info!("Series written to {}", path);
        }
    } else if let Some(matches) = matches.subcommand_matches("calendar") {
        let code = matches.value_of("exchange").unwrap_or("us");
        let exchange = match Exchange::parse(code) {
            Some(exchange) => exchange,
            None => {
                error!("Unknown exchange: {}", code);
                return Err(format!("Unknown exchange: {}", code).into());
            }
        };
        let year = matches.value_of("year").unwrap_or(&this_year).parse::<i32>()?;

        let mut calendar = TradingCalendar::new();
        if let Some(path) = matches.value_of("holidays") {
            calendar = calendar.load_closures_from_workbook(path)?;
        }

        let (start, end) = match (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year, 12, 31)) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(format!("Invalid year: {}", year).into()),
        };

        println!("{} market holidays in {}", exchange.code(), year);
        let mut date = start;
        while date <= end {
            if date.weekday().number_from_monday() <= 5 && calendar.is_holiday(exchange, date) {
                println!("  {} {}", date, date.format("%A"));
            }
            date += Duration::days(1);
        }
        println!(
            "{} trading days",
            calendar.trading_days(exchange, start, end).len()
        );
    } else {
        info!("No command specified. Use --help for usage information.");
    }

    Ok(())
}
