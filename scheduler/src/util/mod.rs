pub mod node_list;
pub mod priority_queue;

pub use node_list::{feasible_nodes_to_find, predicate_nodes, prioritize_nodes, select_top_nodes};
pub use priority_queue::PriorityQueue;
