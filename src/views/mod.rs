//! Frontend-agnostic view models for the todo screen.
//!
//! They hold what a UI shows and turn user events into repository calls; how
//! the state is drawn is up to the embedding frontend.

pub mod todo_item;
pub mod todo_list;

pub use todo_item::{EditKey, EditOutcome, EditRequest, ItemDisplay, TodoItemView};
pub use todo_list::TodoListView;
