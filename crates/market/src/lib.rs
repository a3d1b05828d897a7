pub mod yahoo;

pub use yahoo::{parse_chart_response, YahooClient};
