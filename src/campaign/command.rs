//! 外部命令：由调用方提交到 Runtime Loop 的命令队列，只被消费一次，不持久化

/// 发往 Runtime Loop 的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 新的用户指令：创建或继续 Campaign，并恢复执行
    UserMessage(String),
    /// 暂停当前 Campaign
    Stop,
    /// 从暂停中恢复
    Resume,
}
