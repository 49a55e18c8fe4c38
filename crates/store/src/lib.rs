pub mod csv_writer;
pub mod graph;
pub mod memory;
pub mod neo4j;
pub mod rows;

pub use csv_writer::CsvWriter;
pub use graph::{GraphOp, GraphSink, GraphStats};
pub use memory::{GraphSnapshot, MemoryGraph};
pub use neo4j::{Neo4jConfig, Neo4jWriter};
pub use rows::{round1, ResultRow};
