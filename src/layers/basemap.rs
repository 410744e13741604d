//! Raster base map layer.

use super::BASEMAP_Z_ORDER;
use crate::error::MapResult;
use crate::geo::{Primitive, PrimitiveBody, PrimitiveId, TileSource};
use crate::map::{LayerId, LayerModule, LayerRegistry};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Base map properties.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMapProps {
    /// Tile URL with `{z}/{x}/{y}` placeholders
    pub url_template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl BaseMapProps {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            min_zoom: 0,
            max_zoom: 19,
        }
    }
}

/// Emits the base tile primitive every composite is anchored to.
pub struct BaseMapLayer {
    id: LayerId,
    registry: Rc<LayerRegistry>,
    props: BaseMapProps,
    registered: bool,
}

impl BaseMapLayer {
    pub fn new(registry: &Rc<LayerRegistry>, props: BaseMapProps) -> Rc<RefCell<Self>> {
        let layer = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let id = registry.register(weak.clone(), "basemap", BASEMAP_Z_ORDER);
            RefCell::new(Self {
                id,
                registry: registry.clone(),
                props,
                registered: true,
            })
        });
        if let Err(e) = layer.borrow_mut().render(false) {
            log::error!("{}", e);
        }
        layer
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn set_props(&mut self, props: BaseMapProps) {
        if props == self.props {
            return;
        }
        self.props = props;
        if let Err(e) = self.render(false) {
            log::error!("{}", e);
        }
    }

    pub fn destroy(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.registry.deregister(self.id);
        }
    }
}

impl LayerModule for BaseMapLayer {
    fn render(&mut self, _regenerate: bool) -> MapResult<()> {
        let tiles = Primitive::new(
            PrimitiveId::new(self.id, "tiles", self.registry.identity_token()),
            PrimitiveBody::BaseTiles(TileSource {
                url_template: self.props.url_template.clone(),
                min_zoom: self.props.min_zoom,
                max_zoom: self.props.max_zoom,
            }),
        );
        self.registry.update_layer(self.id, vec![tiles]);
        Ok(())
    }
}

impl Drop for BaseMapLayer {
    fn drop(&mut self) {
        self.destroy();
    }
}
