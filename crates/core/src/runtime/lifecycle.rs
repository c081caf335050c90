use super::*;

impl StubIndexEngine {
    /// Wipe every domain and the primary store, then rewrite version stamps.
    ///
    /// Takes every domain lock and the primary lock in update order, so no
    /// update can observe a half-cleared index. With nothing stored any more,
    /// the current name table generation becomes the valid one.
    pub fn clear(&self) -> Result<()> {
        {
            let mut locks = self.lock_everything()?;
            locks.domains.clear_all()?;
            locks.primary.clear()?;
            if self.names.is_corrupted() {
                self.names.repair();
            }
            self.names_generation.store(self.names.generation(), Ordering::SeqCst);
            self.write_stamps();
        }
        *self.pending_mismatch_mut()? = None;
        tracing::info!("Stub index cleared");
        Ok(())
    }

    /// Flush every domain, then the primary backend and the name table. Every
    /// step runs even if an earlier one failed; the first error is returned.
    pub fn flush(&self) -> Result<()> {
        let mut first_err = None;

        for domain in self.indices.all_domains() {
            if let Err(e) = self.indices.flush(domain) {
                tracing::error!("Failed to flush domain {}: {}", domain, e);
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.primary.flush() {
            tracing::error!("Failed to flush stub storage: {}", e);
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.names.flush() {
            tracing::error!("Failed to flush name table: {}", e);
            first_err.get_or_insert(e);
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Flush and stop accepting updates. Calling it again does nothing.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let flushed = self.flush();
        let disposed = self.indices.dispose();
        tracing::debug!("Stub index disposed");
        flushed.and(disposed)
    }

    /// Switch the primary overlay on or off and mirror the change onto every
    /// domain. Turning buffering off discards whatever was buffered.
    ///
    /// Returns false when the primary store has no overlay to buffer into.
    pub fn set_buffering_enabled(&self, enabled: bool) -> Result<bool> {
        let mut locks = self.lock_everything()?;
        if !locks.primary.set_buffering(enabled) {
            return Ok(false);
        }
        locks.domains.set_buffering(enabled);
        tracing::info!("Stub index buffering {}", if enabled { "enabled" } else { "disabled" });
        Ok(true)
    }

    /// Drop buffered changes in the primary overlay and every domain.
    pub fn discard_overlay(&self) -> Result<usize> {
        let mut locks = self.lock_everything()?;
        let dropped = locks.primary.clear_overlay();
        locks.domains.cleanup_overlay();
        tracing::debug!("Discarded {} buffered stub(s)", dropped);
        Ok(dropped)
    }
}
