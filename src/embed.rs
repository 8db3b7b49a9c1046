use vitrine_viewer::DEFAULT_TINT;

/// Standalone viewer page with `__TITLE__`, `__MODEL_URL__`, and `__TINT__`
/// placeholders. Kept as a template rather than `format!` so the braces in
/// the CSS and JS stay readable.
const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>__TITLE__ - 3D Viewer</title>
<style>
body { margin:0; padding:0; font-family:Arial,sans-serif; background:#f5f5f5; display:flex; flex-direction:column; align-items:center; min-height:100vh; }
#viewer-container { width:100%; height:70vh; background:#f0f0f0; border:1px solid #ddd; }
.controls-panel { background:white; padding:15px; border-radius:8px; margin:10px; display:flex; gap:15px; align-items:center; }
button { padding:8px 15px; border:none; border-radius:4px; cursor:pointer; }
input[type="color"] { width:50px; height:30px; cursor:pointer; }
</style>
</head>
<body>
<h1>__TITLE__</h1>
<div id="viewer-container"></div>
<div class="controls-panel">
  <button id="reset-view">Reset view</button>
  <input type="color" id="model-color" value="__TINT__">
</div>
<script type="importmap">
{
  "imports": {
    "three": "https://unpkg.com/three@0.155.0/build/three.module.js",
    "three/addons/": "https://unpkg.com/three@0.155.0/examples/jsm/"
  }
}
</script>
<script type="module">
import * as THREE from 'three';
import { OrbitControls } from 'three/addons/controls/OrbitControls.js';
import { GLTFLoader } from 'three/addons/loaders/GLTFLoader.js';

const container = document.getElementById('viewer-container');
const scene = new THREE.Scene();
const camera = new THREE.PerspectiveCamera(75, container.clientWidth / container.clientHeight, 0.1, 1000);
camera.position.z = 7;

const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(container.clientWidth, container.clientHeight);
renderer.setClearColor(0xf0f0f0);
container.appendChild(renderer.domElement);

const controls = new OrbitControls(camera, renderer.domElement);
controls.enableDamping = true;
controls.dampingFactor = 0.05;

scene.add(new THREE.AmbientLight(0xffffff, 0.6));
const sun = new THREE.DirectionalLight(0xffffff, 1);
sun.position.set(5, 10, 7.5);
scene.add(sun);

let currentModel = null;
let currentColor = new THREE.Color('__TINT__');

function applyColor() {
  if (!currentModel) return;
  currentModel.traverse((child) => {
    if (child.isMesh && child.userData.canChangeColor !== false) {
      child.material.color.copy(currentColor);
    }
  });
}

function resetView() {
  if (!currentModel) return;
  const box = new THREE.Box3().setFromObject(currentModel);
  const size = box.getSize(new THREE.Vector3()).length();
  const center = box.getCenter(new THREE.Vector3());
  camera.position.copy(center.clone().add(new THREE.Vector3(0, 0, size * 1.5)));
  camera.lookAt(center);
  controls.target.copy(center);
  controls.update();
}

new GLTFLoader().load('__MODEL_URL__', (gltf) => {
  currentModel = gltf.scene;
  scene.add(currentModel);
  applyColor();
  resetView();
}, undefined, (err) => {
  console.error('Failed to load __MODEL_URL__', err);
});

document.getElementById('model-color').addEventListener('input', (e) => {
  currentColor.set(e.target.value);
  applyColor();
});
document.getElementById('reset-view').addEventListener('click', resetView);

(function animate() {
  requestAnimationFrame(animate);
  if (currentModel) currentModel.rotation.y += 0.01;
  controls.update();
  renderer.render(scene, camera);
})();

window.addEventListener('resize', () => {
  camera.aspect = container.clientWidth / container.clientHeight;
  camera.updateProjectionMatrix();
  renderer.setSize(container.clientWidth, container.clientHeight);
});
</script>
</body>
</html>
"#;

/// A self-contained HTML document viewing one registered model. The caller
/// looks the locator up in the registry, which stays the single source of
/// truth for embeddable paths.
pub fn standalone_viewer_html(model_name: &str, locator: &str) -> String {
    TEMPLATE
        .replace("__TITLE__", model_name)
        .replace("__MODEL_URL__", locator)
        .replace("__TINT__", &DEFAULT_TINT.to_string())
}
