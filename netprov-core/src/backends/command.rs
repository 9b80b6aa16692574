use crate::Result;
use crate::traits::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use tokio::process::Command;

/// Runs real processes. Output is decoded lossily as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        // 参数里可能带有密码，日志只记录命令和第一个参数
        tracing::debug!(program, subcommand = args.first().copied().unwrap_or(""), "Running command");
        let output = Command::new(program).args(args).output().await?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
