pub mod notebook;

pub use notebook::{Notebook, NotebookStore, NotebookSummary, StoreError};
