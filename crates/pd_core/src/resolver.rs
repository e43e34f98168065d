//! Prototype resolution and the prototype caches.
//!
//! The resolver owns two caches: built-in node models by name, and parsed
//! PROTO definitions by URL. Definitions are fetched, split, resolved
//! recursively (all EXTERNPROTOs of a file are awaited together) and
//! header-parsed before they are cached; scenes only ever receive clones.
//!
//! Everything is single-threaded. A [`Resolver`] is a cheap handle that can
//! be cloned into futures; drive it with any executor, e.g.
//! `pollster::block_on(resolver.load(url))`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};

use crate::config::ResolverConfig;
use crate::error::{ProtoError, ProtoResult};
use crate::fetch::ProtoFetcher;
use crate::node::{create_node, BaseNode, ExternProtos, Node, ProtoNode};
use crate::vrml::Tokenizer;

type Resolution = LocalBoxFuture<'static, ProtoResult<Rc<ProtoNode>>>;

struct ResolverState {
    config: ResolverConfig,
    fetcher: Rc<dyn ProtoFetcher>,
    base_models: RefCell<HashMap<String, BaseNode>>,
    proto_models: RefCell<HashMap<String, Rc<ProtoNode>>>,
    in_flight: RefCell<HashMap<String, Shared<Resolution>>>,
    /// In-flight URL -> URLs its resolution is waiting on.
    waiting: RefCell<HashMap<String, Vec<String>>>,
}

/// Handle to the prototype caches.
#[derive(Clone)]
pub struct Resolver {
    inner: Rc<ResolverState>,
}

impl Resolver {
    pub fn new(fetcher: Rc<dyn ProtoFetcher>) -> Self {
        Self::with_config(ResolverConfig::default(), fetcher)
    }

    pub fn with_config(config: ResolverConfig, fetcher: Rc<dyn ProtoFetcher>) -> Self {
        Self {
            inner: Rc::new(ResolverState {
                config,
                fetcher,
                base_models: RefCell::new(HashMap::new()),
                proto_models: RefCell::new(HashMap::new()),
                in_flight: RefCell::new(HashMap::new()),
                waiting: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    /// Fetch, resolve and cache the PROTO at `url`.
    ///
    /// Resolving a URL that is already cached returns the cached definition
    /// without fetching. Failures are not cached.
    pub async fn load(&self, url: &str) -> ProtoResult<Rc<ProtoNode>> {
        self.resolve(url.to_string(), None, Vec::new()).await
    }

    /// Like [`Resolver::load`], with the root source already in hand.
    /// EXTERNPROTOs are still fetched.
    pub async fn load_from_text(&self, url: &str, text: &str) -> ProtoResult<Rc<ProtoNode>> {
        self.resolve(url.to_string(), Some(text.to_string()), Vec::new())
            .await
    }

    /// A new instance of the cached PROTO at `url`, with its body expanded.
    pub fn create_instance(&self, url: &str) -> ProtoResult<Node> {
        let model = self.proto_model(url).ok_or_else(|| {
            ProtoError::Resolution(format!("PROTO at {} has not been loaded", url))
        })?;
        let mut instance = model.as_ref().clone();
        instance.parse_body(self)?;
        log::info!("Instantiated {} as {}", instance.proto_name(), instance.id());
        Ok(Node::Proto(instance))
    }

    /// Build a standalone node such as `Shape { geometry Box { } }`.
    pub fn create_node_from_text(&self, text: &str, context: &ExternProtos) -> ProtoResult<Node> {
        let mut tokens = Tokenizer::tokenize(text)?;
        let node = create_node(&mut tokens, context, self)?;
        if tokens.has_more_tokens() {
            let token = tokens.peek_token();
            return Err(token.error(format!("Unexpected {} after node", token.describe())));
        }
        Ok(node)
    }

    /// A fresh copy of the built-in node `name`, creating its model on first use.
    pub fn base_model(&self, name: &str) -> ProtoResult<BaseNode> {
        let mut models = self.inner.base_models.borrow_mut();
        if let Some(model) = models.get(name) {
            return Ok(model.clone());
        }

        let model = BaseNode::new(name)?;
        let instance = model.clone();
        models.insert(name.to_string(), model);
        Ok(instance)
    }

    /// The cached definition for `url`, if resolved.
    pub fn proto_model(&self, url: &str) -> Option<Rc<ProtoNode>> {
        self.inner.proto_models.borrow().get(url).cloned()
    }

    pub fn cached_base_models(&self) -> usize {
        self.inner.base_models.borrow().len()
    }

    pub fn cached_proto_models(&self) -> usize {
        self.inner.proto_models.borrow().len()
    }

    /// Resolve `url`, sharing the work with any in-flight request for it.
    ///
    /// `chain` lists the URLs whose resolution is waiting on this one.
    pub(crate) fn resolve(
        &self,
        url: String,
        source: Option<String>,
        chain: Vec<String>,
    ) -> Resolution {
        if let Some(proto) = self.proto_model(&url) {
            log::debug!("PROTO cache hit for {}", url);
            return future::ready(Ok(proto)).boxed_local();
        }

        if chain.contains(&url) {
            let err = ProtoError::Resolution(format!(
                "EXTERNPROTO cycle: {} -> {}",
                chain.join(" -> "),
                url
            ));
            return future::ready(Err(err)).boxed_local();
        }

        let pending = self.inner.in_flight.borrow().get(&url).cloned();
        if let Some(pending) = pending {
            if let Some(blocked) = self.waits_on(&url, &chain) {
                let err = ProtoError::Resolution(format!(
                    "EXTERNPROTO cycle: {} -> {} waits on {}",
                    chain.join(" -> "),
                    url,
                    blocked
                ));
                return future::ready(Err(err)).boxed_local();
            }
            log::debug!("Joining in-flight resolution of {}", url);
            self.record_wait(&chain, &url);
            return pending.boxed_local();
        }

        self.record_wait(&chain, &url);
        let resolver = self.clone();
        let key = url.clone();
        let task = async move {
            let result = resolver.construct(&url, source, chain).await;
            resolver.inner.in_flight.borrow_mut().remove(&url);
            resolver.inner.waiting.borrow_mut().remove(&url);
            if let Err(err) = &result {
                log::warn!("Failed to resolve {}: {}", url, err);
            }
            result
        }
        .boxed_local()
        .shared();

        self.inner.in_flight.borrow_mut().insert(key, task.clone());
        task.boxed_local()
    }

    fn record_wait(&self, chain: &[String], url: &str) {
        if let Some(caller) = chain.last() {
            self.inner
                .waiting
                .borrow_mut()
                .entry(caller.clone())
                .or_default()
                .push(url.to_string());
        }
    }

    /// The first URL of `chain` that the in-flight resolution of `url`
    /// already waits on, directly or through other in-flight resolutions.
    fn waits_on(&self, url: &str, chain: &[String]) -> Option<String> {
        let waiting = self.inner.waiting.borrow();
        let mut visited = HashSet::new();
        let mut stack = vec![url];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for next in waiting.get(current).into_iter().flatten() {
                if chain.contains(next) {
                    return Some(next.clone());
                }
                stack.push(next);
            }
        }
        None
    }

    async fn construct(
        &self,
        url: &str,
        source: Option<String>,
        mut chain: Vec<String>,
    ) -> ProtoResult<Rc<ProtoNode>> {
        let text = match source {
            Some(text) => text,
            None => {
                log::info!("Fetching {}", url);
                self.inner.fetcher.fetch(url).await?
            }
        };

        let mut proto = ProtoNode::new(&text, url, &self.inner.config)?;
        chain.push(url.to_string());
        proto.fetch_with_chain(self, &chain).await?;

        let proto = Rc::new(proto);
        let cached = Rc::clone(
            self.inner
                .proto_models
                .borrow_mut()
                .entry(url.to_string())
                .or_insert(proto),
        );
        log::info!("Cached PROTO {} ({})", cached.proto_name(), url);
        Ok(cached)
    }
}
