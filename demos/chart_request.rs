use anyhow::Result;
use egostrategy_chartdata::models::request::{ChartRequest, IndicatorKind};
use egostrategy_chartdata::{ChartService, Config, Outcome};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let service = ChartService::new(Config::from_env()?)?;

    // 先搜索，再对最佳匹配画图
    let resolution = service.search("ASML").await;
    println!("候选代码: {}", resolution.matches.len());
    for candidate in resolution.matches.iter().take(5) {
        println!("  {} - {}", candidate.symbol, candidate.display_name);
    }

    let request = ChartRequest::for_period("ASML.AS", "6mo")
        .with_indicators(IndicatorKind::default_overlays())
        .with_indicator(IndicatorKind::bollinger());
    let response = service.chart(&request).await;

    for warning in &response.warnings {
        println!("警告: {}", warning);
    }

    match &response.series {
        Outcome::Data(series) => {
            println!("{} 共 {} 根K线，间隔 {}", response.symbol, series.len(), response.interval);
            for row in series.tail(5) {
                let ma20 = row
                    .indicators
                    .iter()
                    .find(|(name, _)| name == "MA20")
                    .and_then(|(_, value)| *value);
                println!("  {} 收盘 {:.2} MA20 {:?}", row.bar.timestamp.date(), row.bar.close, ma20);
            }
        }
        other => println!("没有数据: {}", other.message().unwrap_or_default()),
    }

    // 第二次请求命中缓存
    let again = service.chart(&request).await;
    println!("缓存命中，数据一致: {}", again.series == response.series);

    Ok(())
}
