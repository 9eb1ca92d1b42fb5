//! 配置热重载
//!
//! 优先使用文件系统变更通知监听配置文件；创建监听器失败时
//! 降级为定时轮询修改时间（默认5秒）。变更事件经 tokio 通道
//! 送入后台任务，由任务调用 `ConfigManager::reload_from_disk`
//! 并触发已注册的监听器。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::manager::ConfigManager;

/// 配置重载事件
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigReloadEvent {
    /// 监听已就绪
    Ready,
    /// 配置文件发生变更
    Changed(PathBuf),
    /// 配置文件被删除
    Removed(PathBuf),
    /// 监听或重载出错
    Error { path: PathBuf, error: String },
}

/// 启动配置监听任务
///
/// 管理器没有持久化路径时无事可做，返回 `None`。
pub fn spawn_config_watcher(
    manager: Arc<ConfigManager>,
    poll_interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    let path = manager.persist_path()?.to_path_buf();

    Some(tokio::spawn(async move {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<ConfigReloadEvent>(32);

        // 尝试文件系统通知；失败则转为轮询
        let notify_tx = event_tx.clone();
        let notify_path = path.clone();
        let watcher: Option<RecommendedWatcher> = {
            let result = RecommendedWatcher::new(
                move |res: Result<notify::Event, notify::Error>| match res {
                    Ok(event) => {
                        let reload = match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                Some(ConfigReloadEvent::Changed(notify_path.clone()))
                            }
                            EventKind::Remove(_) => {
                                Some(ConfigReloadEvent::Removed(notify_path.clone()))
                            }
                            _ => None,
                        };
                        if let Some(reload) = reload {
                            let _ = notify_tx.blocking_send(reload);
                        }
                    }
                    Err(e) => {
                        let _ = notify_tx.blocking_send(ConfigReloadEvent::Error {
                            path: notify_path.clone(),
                            error: e.to_string(),
                        });
                    }
                },
                notify::Config::default(),
            );

            match result {
                Ok(mut watcher) => match watcher.watch(&path, RecursiveMode::NonRecursive) {
                    Ok(()) => {
                        tracing::info!("配置文件监听已启动: {}", path.display());
                        Some(watcher)
                    }
                    Err(e) => {
                        tracing::warn!("文件监听注册失败，降级为轮询: {}", e);
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!("创建文件监听器失败，降级为轮询: {}", e);
                    None
                }
            }
        };

        // 轮询降级：对比修改时间
        let poll_handle = if watcher.is_none() {
            let poll_tx = event_tx.clone();
            let poll_path = path.clone();
            Some(tokio::spawn(async move {
                let mut last_mtime = file_mtime(&poll_path);
                let mut ticker = tokio::time::interval(poll_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let mtime = file_mtime(&poll_path);
                    if mtime != last_mtime {
                        last_mtime = mtime;
                        let event = if mtime.is_some() {
                            ConfigReloadEvent::Changed(poll_path.clone())
                        } else {
                            ConfigReloadEvent::Removed(poll_path.clone())
                        };
                        if poll_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }))
        } else {
            None
        };

        let _ = event_tx.send(ConfigReloadEvent::Ready).await;

        while let Some(event) = event_rx.recv().await {
            match event {
                ConfigReloadEvent::Ready => {}
                ConfigReloadEvent::Changed(changed) => {
                    tracing::info!("检测到配置变更: {}", changed.display());
                    if let Err(e) = manager.reload_from_disk() {
                        tracing::warn!("配置热重载失败，保留当前配置: {}", e);
                    }
                }
                ConfigReloadEvent::Removed(removed) => {
                    tracing::warn!("配置文件被删除，保留内存配置: {}", removed.display());
                }
                ConfigReloadEvent::Error { path, error } => {
                    tracing::warn!("配置监听错误 {}: {}", path.display(), error);
                }
            }
        }

        if let Some(handle) = poll_handle {
            handle.abort();
        }
        drop(watcher);
    }))
}

fn file_mtime(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::manager::{EngineSettings, ProviderUpdate};

    #[test]
    fn test_no_persist_path_means_no_watcher() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let manager =
            Arc::new(ConfigManager::with_settings(EngineSettings::default(), None).unwrap());
        assert!(spawn_config_watcher(manager, Duration::from_secs(5)).is_none());
    }

    #[tokio::test]
    async fn test_external_change_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let manager = Arc::new(
            ConfigManager::with_settings(EngineSettings::default(), Some(path.clone())).unwrap(),
        );
        // 初次落盘
        manager
            .update_provider(
                "deeplx",
                ProviderUpdate {
                    priority: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();

        let handle = spawn_config_watcher(Arc::clone(&manager), Duration::from_millis(50))
            .expect("有持久化路径时应启动监听");

        // 模拟外部进程改写配置
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut external = manager.snapshot();
        external.services[0].priority = 77;
        std::fs::write(&path, toml::to_string_pretty(&external).unwrap()).unwrap();

        // 等待重载生效
        let mut reloaded = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if manager.provider("deeplx").unwrap().priority == 77 {
                reloaded = true;
                break;
            }
        }
        handle.abort();
        assert!(reloaded, "外部修改应在监听周期内生效");
    }
}
