//! Session and transaction handling.

use crate::connection::manager::ConnectionManager;
use crate::connection::types::{Context, Limits, TxnMode};
use crate::error::Result;

impl ConnectionManager {
    /// Run `f` inside the context's transaction.
    ///
    /// A context that already carries a session runs `f` on it and leaves
    /// commit and abort to whoever opened it. Otherwise `mode` decides:
    /// [`TxnMode::Standalone`] runs `f` without a session, [`TxnMode::Auto`]
    /// opens one, commits when `f` succeeds and aborts when it fails.
    pub fn run_with_txn<T, F>(&self, ctx: &mut Context<'_>, mode: TxnMode, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context<'_>) -> Result<T>,
    {
        if ctx.in_transaction() || mode == TxnMode::Standalone {
            return f(ctx);
        }

        // Sessions and cursors clean up through the runtime when dropped.
        let _runtime = self.runtime.enter();
        let limits = ctx.limits();

        let mut session =
            self.exec(&limits, "start session", async { Ok(self.client.start_session().await?) })?;
        self.exec(&limits, "start transaction", async {
            session.start_transaction().await?;
            Ok(())
        })?;
        log::debug!("transaction started, rid: {}", limits.request_id);

        match f(&mut ctx.attach(&mut session)) {
            Ok(value) => {
                self.exec(&limits, "commit transaction", async {
                    session.commit_transaction().await?;
                    Ok(())
                })?;
                log::debug!("transaction committed, rid: {}", limits.request_id);
                Ok(value)
            }
            Err(err) => {
                // Abort even when the caller has already cancelled.
                let abort_limits =
                    Limits { request_id: limits.request_id.clone(), ..Limits::default() };
                let aborted = self.exec(&abort_limits, "abort transaction", async {
                    session.abort_transaction().await?;
                    Ok(())
                });
                if let Err(abort_err) = aborted {
                    log::error!(
                        "abort transaction failed, err: {abort_err}, cause: {err}, rid: {}",
                        limits.request_id
                    );
                }
                Err(err)
            }
        }
    }

    /// [`run_with_txn`](Self::run_with_txn) in [`TxnMode::Auto`].
    pub fn transaction<T, F>(&self, ctx: &mut Context<'_>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context<'_>) -> Result<T>,
    {
        self.run_with_txn(ctx, TxnMode::Auto, f)
    }
}
