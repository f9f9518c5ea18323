//! I/O 完成线程池
//!
//! 提交到后端设备的传输在专用线程上执行，完成回调也在这些线程上运行，
//! 对提交者而言就是异步完成。提交本身只是入队，不会阻塞，因此可以在
//! 持有缓存引擎锁时进行。

use crate::error::{Error, ErrorKind, Result};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// 排队执行的 I/O 任务
pub(crate) type IoJob = Box<dyn FnOnce() + Send + 'static>;

/// I/O 完成线程池
pub(crate) struct IoQueue {
    /// 任务发送端，关闭时取走以通知线程退出
    sender: Option<Sender<IoJob>>,
    /// 工作线程
    workers: Vec<JoinHandle<()>>,
}

impl IoQueue {
    /// 启动 `threads` 个工作线程（至少一个）
    pub(crate) fn new(threads: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<IoJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let threads = threads.max(1);

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver = Arc::clone(&receiver);
            let handle = std::thread::Builder::new()
                .name(format!("bufio-io-{}", i))
                .spawn(move || worker_loop(receiver))
                .map_err(|e| Error::with_cause(ErrorKind::NoMemory, "failed to spawn I/O worker", e))?;
            workers.push(handle);
        }
        log::debug!("[BUFIO-IO] started {} I/O workers", threads);

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// 提交任务
    ///
    /// 线程池已关闭时在当前线程直接执行，保证回调总会被调用一次
    pub(crate) fn push(&self, job: IoJob) {
        match &self.sender {
            Some(sender) => {
                if let Err(mpsc::SendError(job)) = sender.send(job) {
                    log::warn!("[BUFIO-IO] I/O workers gone, running job inline");
                    job();
                }
            }
            None => job(),
        }
    }

    /// 工作线程数
    pub(crate) fn threads(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<IoJob>>>) {
    loop {
        // 只在取任务时持锁，执行任务时其他线程可以继续取
        let job = receiver.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

impl Drop for IoQueue {
    fn drop(&mut self) {
        // 关闭发送端，线程处理完剩余任务后退出
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("[BUFIO-IO] I/O worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_jobs_run_on_workers() {
        let queue = IoQueue::new(2).unwrap();
        assert_eq!(queue.threads(), 2);

        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            queue.push(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let name = std::thread::current().name().map(|n| n.to_string());
                tx.send(name).unwrap();
            }));
        }
        for _ in 0..10 {
            let name = rx.recv().unwrap().unwrap();
            assert!(name.starts_with("bufio-io-"));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_drop_drains_pending_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let queue = IoQueue::new(1).unwrap();
            for _ in 0..5 {
                let counter = Arc::clone(&counter);
                queue.push(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_zero_threads_clamped() {
        let queue = IoQueue::new(0).unwrap();
        assert_eq!(queue.threads(), 1);
    }
}
