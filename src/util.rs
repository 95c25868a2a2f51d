use crate::interval::Interval;
use chrono::NaiveDateTime;

/// 代码统一去空格并转大写，作为缓存键与请求参数
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Timestamp label for tables: minutes for intraday bars, the date otherwise.
pub fn format_timestamp(timestamp: NaiveDateTime, interval: Interval) -> String {
    if interval.is_intraday() {
        timestamp.format("%Y-%m-%d %H:%M").to_string()
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

// Arrow数据转换工具
pub mod arrow_utils {
    use crate::errors::{ChartDataError, Result};
    use crate::interval::Interval;
    use crate::models::bar::Bar;
    use crate::models::series::PriceSeries;
    use crate::models::symbol::AssetClass;
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow_ipc::reader::FileReader;
    use arrow_ipc::writer::FileWriter;
    use arrow::record_batch::RecordBatch;
    use arrow_array::{Array, ArrayRef, Float64Array, TimestampMillisecondArray, UInt64Array};
    use chrono::DateTime;
    use log::info;
    use std::collections::{BTreeMap, HashMap};
    use std::fs::File;
    use std::io::Cursor;
    use std::sync::Arc;

    const BAR_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

    // 将价格序列转换为Arrow记录批次，指标列追加在K线列之后
    pub fn price_series_to_record_batch(series: &PriceSeries) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new("timestamp", DataType::Timestamp(TimeUnit::Millisecond, None), false),
            Field::new("open", DataType::Float64, false),
            Field::new("high", DataType::Float64, false),
            Field::new("low", DataType::Float64, false),
            Field::new("close", DataType::Float64, false),
            Field::new("volume", DataType::UInt64, false),
        ];

        let timestamps: Vec<i64> = series.bars.iter().map(|b| b.timestamp.and_utc().timestamp_millis()).collect();
        let price = |f: fn(&Bar) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from(series.bars.iter().map(f).collect::<Vec<f64>>()))
        };

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMillisecondArray::from(timestamps)),
            price(|b| b.open),
            price(|b| b.high),
            price(|b| b.low),
            price(|b| b.close),
            Arc::new(UInt64Array::from(series.bars.iter().map(|b| b.volume).collect::<Vec<u64>>())),
        ];

        for (name, values) in &series.indicators {
            fields.push(Field::new(name, DataType::Float64, true));
            columns.push(Arc::new(Float64Array::from(values.clone())));
        }

        let mut metadata = HashMap::new();
        metadata.insert("symbol".to_string(), series.symbol.clone());
        metadata.insert("interval".to_string(), series.interval.as_str().to_string());
        metadata.insert("asset_class".to_string(), serde_json::to_string(&series.asset_class)?);
        if let Some(name) = &series.display_name {
            metadata.insert("display_name".to_string(), name.clone());
        }

        let schema = Schema::new_with_metadata(fields, metadata);
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }

    // 从记录批次还原价格序列
    pub fn record_batch_to_price_series(batch: &RecordBatch) -> Result<PriceSeries> {
        let schema = batch.schema();
        let metadata = schema.metadata();

        let symbol = metadata
            .get("symbol")
            .ok_or_else(|| ChartDataError::DataError("Arrow schema has no symbol".to_string()))?;
        let interval = metadata
            .get("interval")
            .and_then(|i| Interval::parse(i))
            .ok_or_else(|| ChartDataError::DataError("Arrow schema has no valid interval".to_string()))?;
        let asset_class: AssetClass = match metadata.get("asset_class") {
            Some(text) => serde_json::from_str(text)?,
            None => AssetClass::classify(symbol, None),
        };

        let timestamps = batch
            .column_by_name("timestamp")
            .and_then(|a| a.as_any().downcast_ref::<TimestampMillisecondArray>())
            .ok_or_else(|| ChartDataError::DataError("Failed to downcast timestamp column".to_string()))?;
        let (open, high, low, close) = (
            float_column(batch, "open")?,
            float_column(batch, "high")?,
            float_column(batch, "low")?,
            float_column(batch, "close")?,
        );
        let volume = batch
            .column_by_name("volume")
            .and_then(|a| a.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| ChartDataError::DataError("Failed to downcast volume column".to_string()))?;

        let mut bars = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let timestamp = DateTime::from_timestamp_millis(timestamps.value(i))
                .ok_or_else(|| ChartDataError::DataError(format!("Invalid timestamp in row {}", i)))?
                .naive_utc();
            bars.push(Bar {
                timestamp,
                open: open.value(i),
                high: high.value(i),
                low: low.value(i),
                close: close.value(i),
                volume: volume.value(i),
            });
        }

        let mut indicators = BTreeMap::new();
        for field in schema.fields() {
            if BAR_COLUMNS.contains(&field.name().as_str()) {
                continue;
            }
            let values = float_column(batch, field.name())?;
            let values: Vec<Option<f64>> = (0..values.len())
                .map(|i| if values.is_null(i) { None } else { Some(values.value(i)) })
                .collect();
            indicators.insert(field.name().clone(), values);
        }

        let mut series = PriceSeries::new(symbol, interval, asset_class, bars)
            .with_display_name(metadata.get("display_name").cloned());
        series.indicators = indicators;
        Ok(series)
    }

    fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
        batch
            .column_by_name(name)
            .and_then(|a| a.as_any().downcast_ref::<Float64Array>())
            .ok_or_else(|| ChartDataError::DataError(format!("Failed to downcast {} column", name)))
    }

    // 将价格序列保存到Arrow文件
    pub fn save_price_series_to_arrow(series: &PriceSeries, path: &str) -> Result<()> {
        info!(
            "Saving {} bars and {} indicator columns of {} to {}",
            series.len(),
            series.indicators.len(),
            series.symbol,
            path
        );

        let batch = price_series_to_record_batch(series)?;
        let file = File::create(path)?;

        let mut writer = FileWriter::try_new(file, &batch.schema())?;
        writer.write(&batch)?;
        writer.finish()?;

        Ok(())
    }

    // 从Arrow文件读取价格序列
    pub fn read_price_series_from_arrow(path: &str) -> Result<PriceSeries> {
        let file = File::open(path)?;
        read_batches(FileReader::try_new(file, None)?)
    }

    // 从内存中读取Arrow数据
    pub fn read_price_series_from_memory(data: &[u8]) -> Result<PriceSeries> {
        read_batches(FileReader::try_new(Cursor::new(data), None)?)
    }

    fn read_batches<R: std::io::Read + std::io::Seek>(reader: FileReader<R>) -> Result<PriceSeries> {
        let mut series: Option<PriceSeries> = None;
        for batch in reader {
            let part = record_batch_to_price_series(&batch?)?;
            series = Some(match series {
                None => part,
                Some(mut acc) => {
                    acc.bars.extend(part.bars);
                    for (name, values) in part.indicators {
                        acc.indicators.entry(name).or_default().extend(values);
                    }
                    acc
                }
            });
        }
        series.ok_or_else(|| ChartDataError::DataError("Arrow file holds no record batch".to_string()))
    }

    /// JSON array of row objects, one per bar. Undefined indicator values are
    /// left out of their row.
    pub fn price_series_to_json(series: &PriceSeries) -> Result<String> {
        let batch = price_series_to_record_batch(series)?;
        let mut writer = arrow_json::ArrayWriter::new(Vec::new());
        writer.write_batches(&[&batch])?;
        writer.finish()?;
        String::from_utf8(writer.into_inner()).map_err(|e| ChartDataError::DataError(e.to_string()))
    }
}
