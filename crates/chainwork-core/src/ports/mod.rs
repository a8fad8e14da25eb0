//! Ports - 抽象化レイヤー
//!
//! ホスト側（表示、通知、前提条件）へのインターフェースを定義します。
//! 実装は `impls` に置きます。

pub mod display;
pub mod gate;
pub mod notice;

// 主要な trait を再エクスポート
pub use self::display::{DisplayKey, DisplaySink, DisplaySpec};
pub use self::gate::{AlwaysOpen, ConditionGate, Connectivity, NetworkGate};
pub use self::notice::{Notice, NoticeSink};
