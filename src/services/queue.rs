use crate::core::state::{ChapterSummary, Character, Outline};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineTaskPayload {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterTaskPayload {
    pub prompt: String,
    pub outline: Outline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterTaskPayload {
    /// 1-based position of the chapter in the outline.
    pub position: u32,
    pub chapter: ChapterSummary,
    pub novel_title: String,
    pub logline: String,
    /// `None` for the first drafting pass, before characters exist.
    pub characters: Option<Vec<Character>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    Outline(OutlineTaskPayload),
    Characters(CharacterTaskPayload),
    Chapter(ChapterTaskPayload),
}

impl TaskPayload {
    pub fn stage(&self) -> &'static str {
        match self {
            TaskPayload::Outline(_) => "outline",
            TaskPayload::Characters(_) => "character",
            TaskPayload::Chapter(_) => "chapter",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TaskPayload::Outline(_) => "Generate Novel Outline".to_string(),
            TaskPayload::Characters(_) => "Generate Novel Characters".to_string(),
            TaskPayload::Chapter(p) => format!("Write Chapter {}: {}", p.position, p.chapter.title),
        }
    }
}

impl ChapterTaskPayload {
    pub fn for_outline<'a>(
        outline: &'a Outline,
        characters: Option<&[Character]>,
    ) -> impl Iterator<Item = ChapterTaskPayload> + 'a {
        let characters = characters.map(|c| c.to_vec());
        outline.chapters.iter().enumerate().map(move |(i, chapter)| ChapterTaskPayload {
            position: i as u32 + 1,
            chapter: chapter.clone(),
            novel_title: outline.title.clone(),
            logline: outline.logline.clone(),
            characters: characters.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub target: String,
    pub payload: TaskPayload,
}

impl Task {
    pub fn new(target: impl Into<String>, payload: TaskPayload) -> Self {
        Self {
            target: target.into(),
            payload,
        }
    }
}

/// Unbounded FIFO of pending tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: Task) {
        log::debug!("[TaskQueue] Added task: {}", task.payload.describe());
        self.queue.push_back(task);
    }

    /// `None` when the queue is drained.
    pub fn dequeue(&mut self) -> Option<Task> {
        let task = self.queue.pop_front()?;
        log::debug!("[TaskQueue] Retrieved task: {}", task.payload.describe());
        Some(task)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn peek_targets(&self) -> Vec<&str> {
        self.queue.iter().map(|t| t.target.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline_task(prompt: &str) -> Task {
        Task::new(
            "outline_agent",
            TaskPayload::Outline(OutlineTaskPayload {
                prompt: prompt.to_string(),
            }),
        )
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        for i in 0..5 {
            queue.enqueue(outline_task(&i.to_string()));
        }
        assert_eq!(queue.size(), 5);

        let mut seen = Vec::new();
        while let Some(task) = queue.dequeue() {
            match task.payload {
                TaskPayload::Outline(p) => seen.push(p.prompt),
                other => panic!("unexpected payload {:?}", other),
            }
        }
        assert_eq!(seen, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_dequeue_empty_is_none() {
        let mut queue = TaskQueue::new();
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());

        queue.enqueue(outline_task("x"));
        assert!(queue.dequeue().is_some());
        assert!(queue.dequeue().is_none());
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn test_interleaved_enqueue_lands_after_existing() {
        let mut queue = TaskQueue::new();
        queue.enqueue(outline_task("a"));
        queue.enqueue(outline_task("b"));
        let first = queue.dequeue().unwrap();
        queue.enqueue(outline_task("c"));

        assert_eq!(first.payload, outline_task("a").payload);
        assert_eq!(queue.dequeue().unwrap().payload, outline_task("b").payload);
        assert_eq!(queue.dequeue().unwrap().payload, outline_task("c").payload);
    }

    #[test]
    fn test_chapter_payloads_for_outline() {
        let outline = Outline {
            title: "T".to_string(),
            logline: "L".to_string(),
            chapters: vec![
                ChapterSummary { title: "One".to_string(), summary: "s1".to_string() },
                ChapterSummary { title: "Two".to_string(), summary: "s2".to_string() },
            ],
        };
        let payloads: Vec<_> = ChapterTaskPayload::for_outline(&outline, None).collect();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].position, 1);
        assert_eq!(payloads[1].position, 2);
        assert_eq!(payloads[1].chapter.title, "Two");
        assert!(payloads[0].characters.is_none());
    }
}
