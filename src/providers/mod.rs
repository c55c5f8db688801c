pub mod cohere;

pub use cohere::CohereProvider;
