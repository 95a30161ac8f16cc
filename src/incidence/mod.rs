//! Document-topic and term-topic incidences
//!
//! Turns per-document topic assignments into a real-valued document x topic
//! matrix and a binary term x topic matrix, and moves both through CSV.

pub mod builder;
pub mod csv_io;
pub mod matrix;

pub use builder::{
    build_document_topic_incidence, build_term_topic_incidence, read_topic_words, topic_words,
    write_topic_words, IncidenceBuilder, TopicWords,
};
pub use csv_io::{read_csv, read_csv_from, write_csv, write_csv_to, CsvCell};
pub use matrix::{index_labels, IncidenceMatrix};
