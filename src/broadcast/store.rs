use serde::{Deserialize, Serialize};

/*
    The application log holds what has been delivered, split into top-level
    posts and replies. Insertion order is delivery order. A reply may be
    delivered before its parent; it is kept and shown as an orphan until
    the parent arrives.
*/

pub trait Threaded {
    fn id(&self) -> &str;
    fn parent(&self) -> Option<&str>;
    fn to_item(&self) -> FeedItem;
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub author: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub stamp: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Feed {
    pub posts: Vec<FeedItem>,
    pub replies: Vec<FeedItem>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Thread<'a> {
    pub post: &'a FeedItem,
    pub replies: Vec<&'a FeedItem>,
}

#[derive(Debug)]
pub struct DeliveryLog<T> {
    pub posts: Vec<T>,
    pub replies: Vec<T>,
}

impl<T> Default for DeliveryLog<T> {
    fn default() -> Self {
        DeliveryLog {
            posts: Vec::new(),
            replies: Vec::new(),
        }
    }
}

impl<T: Threaded> DeliveryLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: T) {
        if entry.parent().is_none() {
            self.posts.push(entry);
        } else {
            self.replies.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len() + self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.posts.iter().chain(self.replies.iter()).any(|e| e.id() == id)
    }

    pub fn feed(&self) -> Feed {
        Feed {
            posts: self.posts.iter().map(Threaded::to_item).collect(),
            replies: self.replies.iter().map(Threaded::to_item).collect(),
        }
    }
}

impl Feed {
    pub fn threads(&self) -> Vec<Thread<'_>> {
        self.posts
            .iter()
            .map(|post| Thread {
                post,
                replies: self
                    .replies
                    .iter()
                    .filter(|r| r.parent_id.as_deref() == Some(post.id.as_str()))
                    .collect(),
            })
            .collect()
    }

    /// Replies whose parent has not been delivered (yet).
    pub fn orphans(&self) -> Vec<&FeedItem> {
        self.replies
            .iter()
            .filter(|r| !self.posts.iter().any(|p| Some(p.id.as_str()) == r.parent_id.as_deref()))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Feed:\n");
        for thread in self.threads() {
            out.push_str(&format!(
                "Post {} by {} ({}): {}\n",
                thread.post.id, thread.post.author, thread.post.stamp, thread.post.content
            ));
            for reply in thread.replies {
                out.push_str(&format!(
                    "  Reply {} by {} ({}): {}\n",
                    reply.id, reply.author, reply.stamp, reply.content
                ));
            }
        }
        let orphans = self.orphans();
        if !orphans.is_empty() {
            out.push_str("Orphan replies:\n");
            for reply in orphans {
                out.push_str(&format!(
                    "  Reply {} to {} by {}: {}\n",
                    reply.id,
                    reply.parent_id.as_deref().unwrap_or("?"),
                    reply.author,
                    reply.content
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entry(&'static str, Option<&'static str>);

    impl Threaded for Entry {
        fn id(&self) -> &str {
            self.0
        }

        fn parent(&self) -> Option<&str> {
            self.1
        }

        fn to_item(&self) -> FeedItem {
            FeedItem {
                id: self.0.to_string(),
                author: "alice".to_string(),
                content: format!("content of {}", self.0),
                parent_id: self.1.map(str::to_string),
                stamp: String::new(),
            }
        }
    }

    #[test]
    fn test_append_classifies_by_parent() {
        let mut log = DeliveryLog::new();
        log.append(Entry("p1", None));
        log.append(Entry("r1", Some("p1")));
        log.append(Entry("p2", None));

        assert_eq!(log.posts.len(), 2);
        assert_eq!(log.replies.len(), 1);
        assert!(log.contains("r1"));
        assert!(!log.contains("r2"));
    }

    #[test]
    fn test_threads_and_orphans() {
        let mut log = DeliveryLog::new();
        log.append(Entry("r0", Some("missing")));
        log.append(Entry("p1", None));
        log.append(Entry("r1", Some("p1")));
        log.append(Entry("r2", Some("p1")));

        let feed = log.feed();
        let threads = feed.threads();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].post.id, "p1");
        let reply_ids: Vec<_> = threads[0].replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(reply_ids, vec!["r1", "r2"]);

        let orphans = feed.orphans();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, "r0");

        let rendered = feed.render();
        assert!(rendered.contains("Post p1"));
        assert!(rendered.contains("Orphan replies:"));
    }
}
