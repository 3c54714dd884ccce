//! 外部签名方：签名并提交编译好的消息；用户拒绝签名是独立的、非错误的结果。

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::info;

use crate::ledger::{LedgerClient, LedgerError};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("用户拒绝签名")]
    Declined,
    #[error("签名失败: {0}")]
    Signing(String),
    #[error("交易提交失败: {0}")]
    Submit(#[from] LedgerError),
}

impl WalletError {
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }
}

#[async_trait]
pub trait SigningAuthority: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_and_submit(&self, message: VersionedMessage) -> Result<Signature, WalletError>;
}

/// 使用本地密钥签名，并通过同一个网络客户端提交。
pub struct KeypairAuthority {
    keypair: Arc<Keypair>,
    ledger: Arc<dyn LedgerClient>,
}

impl KeypairAuthority {
    pub fn new(keypair: Arc<Keypair>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { keypair, ledger }
    }
}

#[async_trait]
impl SigningAuthority for KeypairAuthority {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_and_submit(&self, message: VersionedMessage) -> Result<Signature, WalletError> {
        let tx = VersionedTransaction::try_new(message, &[self.keypair.as_ref()])
            .map_err(|err| WalletError::Signing(err.to_string()))?;
        Ok(self.ledger.send_transaction(&tx).await?)
    }
}

/// 每次签名前在终端询问确认，输入 `y` 以外的内容视为拒绝。
pub struct PromptingAuthority<A> {
    inner: A,
    input: Mutex<BufReader<Stdin>>,
}

impl<A> PromptingAuthority<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

#[async_trait]
impl<A: SigningAuthority> SigningAuthority for PromptingAuthority<A> {
    fn pubkey(&self) -> Pubkey {
        self.inner.pubkey()
    }

    async fn sign_and_submit(&self, message: VersionedMessage) -> Result<Signature, WalletError> {
        let instructions = message.instructions().len();
        let approved = {
            let mut input = self.input.lock().await;
            prompt_approval(&mut *input, &mut tokio::io::stdout(), instructions)
                .await
                .map_err(|err| WalletError::Signing(err.to_string()))?
        };
        if !approved {
            info!(target: "wallet", "用户拒绝签名");
            return Err(WalletError::Declined);
        }
        self.inner.sign_and_submit(message).await
    }
}

async fn prompt_approval<R, W>(input: &mut R, output: &mut W, instructions: usize) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("签名并提交包含 {instructions} 条指令的交易？[y/N] ").as_bytes())
        .await?;
    output.flush().await?;
    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_explicit_yes_approves() {
        for (answer, expected) in [
            ("y\n", true),
            ("yes\n", true),
            ("Y\n", true),
            ("n\n", false),
            ("\n", false),
            ("", false),
        ] {
            let mut input = answer.as_bytes();
            let mut output = Vec::new();
            let approved = prompt_approval(&mut input, &mut output, 3).await.unwrap();
            assert_eq!(approved, expected, "answer {answer:?}");
            assert!(String::from_utf8(output).unwrap().contains("3 条指令"));
        }
    }
}
