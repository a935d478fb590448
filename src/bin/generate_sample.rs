use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (PCG-style LCG) so the sample files are
/// reproducible across runs.
struct SampleRng {
    state: u64,
}

impl SampleRng {
    fn new(seed: u64) -> Self {
        SampleRng {
            state: seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state ^ (self.state >> 31)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

struct Listing {
    price: Option<f64>,
    model_year: Option<i64>,
    odometer: Option<f64>,
    model: Option<String>,
    condition: String,
}

fn generate_listings(n: usize, rng: &mut SampleRng) -> Vec<Listing> {
    let catalog: [(&str, &[&str], f64); 6] = [
        ("ford", &["f-150", "explorer", "focus", "escape"], 14_000.0),
        ("chevrolet", &["silverado", "malibu", "equinox"], 13_000.0),
        ("toyota", &["camry", "corolla", "tacoma"], 15_000.0),
        ("honda", &["civic", "accord", "cr-v"], 14_500.0),
        ("nissan", &["altima", "rogue", "frontier"], 12_000.0),
        ("bmw", &["x5", "320i"], 22_000.0),
    ];
    let conditions = ["excellent", "good", "fair", "like new", "salvage"];

    (0..n)
        .map(|_| {
            let (brand, models, base_price) = rng.pick(&catalog);
            let year = 1990 + (rng.next_u64() % 34) as i64;
            let age = (2024 - year) as f64;

            // Older cars: lower price, more miles, with some scatter.
            let price = (base_price * (-age / 12.0).exp() * rng.range(0.7, 1.3)).round();
            let odometer = (age * rng.range(8_000.0, 15_000.0)).round();

            Listing {
                price: (!rng.chance(0.03)).then_some(price),
                model_year: (!rng.chance(0.04)).then_some(year),
                odometer: (!rng.chance(0.08)).then_some(odometer),
                model: (!rng.chance(0.05)).then(|| format!("{brand} {}", rng.pick(models))),
                condition: rng.pick(&conditions).to_string(),
            }
        })
        .collect()
}

fn write_csv(path: &str, listings: &[Listing]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;
    writer.write_record(["price", "model_year", "odometer", "model", "condition"])?;

    for l in listings {
        // Empty cells mark missing values, the way pandas writes them out.
        writer.write_record([
            l.price.map(|v| v.to_string()).unwrap_or_default(),
            l.model_year.map(|v| v.to_string()).unwrap_or_default(),
            l.odometer.map(|v| v.to_string()).unwrap_or_default(),
            l.model.clone().unwrap_or_default(),
            l.condition.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, listings: &[Listing]) -> Result<()> {
    let price = Float64Array::from(listings.iter().map(|l| l.price).collect::<Vec<_>>());
    let model_year = Int64Array::from(listings.iter().map(|l| l.model_year).collect::<Vec<_>>());
    let odometer = Float64Array::from(listings.iter().map(|l| l.odometer).collect::<Vec<_>>());
    let model = StringArray::from(listings.iter().map(|l| l.model.as_deref()).collect::<Vec<_>>());
    let condition = StringArray::from(
        listings
            .iter()
            .map(|l| Some(l.condition.as_str()))
            .collect::<Vec<_>>(),
    );

    let schema = Arc::new(Schema::new(vec![
        Field::new("price", DataType::Float64, true),
        Field::new("model_year", DataType::Int64, true),
        Field::new("odometer", DataType::Float64, true),
        Field::new("model", DataType::Utf8, true),
        Field::new("condition", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(price),
            Arc::new(model_year),
            Arc::new(odometer),
            Arc::new(model),
            Arc::new(condition),
        ],
    )
    .context("building record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = SampleRng::new(42);
    let listings = generate_listings(500, &mut rng);

    write_csv("vehicle_listings.csv", &listings)?;
    write_parquet("vehicle_listings.parquet", &listings)?;

    println!(
        "Wrote {} listings to vehicle_listings.csv and vehicle_listings.parquet",
        listings.len()
    );
    Ok(())
}
