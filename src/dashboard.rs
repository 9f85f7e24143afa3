//! Admin dashboard state
//!
//! Messages are loaded once on mount. Switching tabs never fetches.

use std::sync::Arc;

use crate::{
    message::{ContactMessage, MessageBoard},
    progress::ProgressReporter,
    storage::{index, object},
    upload::UploadPipeline,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    Uploads,
    Messages,
}

pub struct Dashboard<'s, O, I> {
    tab: DashboardTab,
    uploads: UploadPipeline<'s, O, I>,
    board: MessageBoard<'s, I>,
    messages: Vec<ContactMessage>,
}

impl<'s, O: object::Client, I: index::Client> Dashboard<'s, O, I> {
    /// Opens on the uploads tab with the stored messages loaded.
    pub async fn mount(objects: &'s O, index: &'s I) -> Result<Self, I::Error> {
        let board = MessageBoard::new(index);
        let messages = board.list().await?;
        Ok(Self {
            tab: DashboardTab::default(),
            uploads: UploadPipeline::new(objects, index),
            board,
            messages,
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.uploads = self.uploads.with_reporter(reporter);
        self
    }

    pub fn tab(&self) -> DashboardTab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: DashboardTab) {
        self.tab = tab;
    }

    pub fn uploads(&mut self) -> &mut UploadPipeline<'s, O, I> {
        &mut self.uploads
    }

    pub fn messages(&self) -> &[ContactMessage] {
        &self.messages
    }

    pub async fn delete_message(&mut self, id: i64) -> Result<(), I::Error> {
        self.messages = self.board.delete(id).await?;
        Ok(())
    }
}
