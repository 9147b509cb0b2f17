pub mod conf;
pub mod pd;
pub mod rnn_weights;

pub use conf::RnnReorderConf;
pub use pd::{PdState, RnnWeightsReorderPd};
pub use rnn_weights::RnnWeightsReorder;
