//! Job definitions built on the pipeline runtime

pub mod dwd_trade_order_detail;
